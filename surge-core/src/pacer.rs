use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Hands out due iterations to VUs for an arrival-rate scenario.
///
/// The pacer task calls [`ArrivalPacer::update_due`] as time advances; VUs call
/// [`ArrivalPacer::claim_next`] to take one iteration each.
#[derive(Debug)]
pub struct ArrivalPacer {
    scheduled_total: AtomicU64,
    claimed_total: AtomicU64,
    dropped_total: AtomicU64,

    active_vus: AtomicU64,
    pre_allocated_vus: u64,
    max_vus: u64,

    done: AtomicBool,
    notify: Notify,
}

impl ArrivalPacer {
    pub fn new(pre_allocated_vus: u64, max_vus: u64) -> Self {
        Self {
            scheduled_total: AtomicU64::new(0),
            claimed_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            active_vus: AtomicU64::new(pre_allocated_vus.clamp(1, max_vus.max(1))),
            pre_allocated_vus,
            max_vus,
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Stop scheduling. Iterations still in the backlog are counted as dropped.
    pub fn mark_done(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }

        // Swallow the backlog so no VU can claim it after this point.
        let scheduled = self.scheduled_total.load(Ordering::Acquire);
        let claimed = self.claimed_total.swap(scheduled, Ordering::AcqRel);
        let unclaimed = scheduled.saturating_sub(claimed);
        if unclaimed != 0 {
            self.dropped_total.fetch_add(unclaimed, Ordering::Relaxed);
        }

        self.notify.notify_waiters();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn scheduled_total(&self) -> u64 {
        self.scheduled_total.load(Ordering::Relaxed)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn active_vus(&self) -> u64 {
        self.active_vus.load(Ordering::Relaxed)
    }

    pub fn max_vus(&self) -> u64 {
        self.max_vus
    }

    pub fn backlog(&self) -> u64 {
        let claimed = self.claimed_total.load(Ordering::Relaxed);
        let scheduled = self.scheduled_total.load(Ordering::Relaxed);
        scheduled.saturating_sub(claimed)
    }

    pub fn update_due(&self, add_due: u64) {
        if self.is_done() {
            return;
        }

        if add_due == 0 {
            // Still update active_vus based on backlog.
            self.update_active_vus();
            return;
        }

        // Bound the backlog so a slow target cannot build an unbounded queue.
        let max_backlog = self.max_vus.max(1);
        let allowed_to_add = max_backlog.saturating_sub(self.backlog());
        let to_add = add_due.min(allowed_to_add);
        let dropped = add_due.saturating_sub(to_add);

        if to_add != 0 {
            self.scheduled_total.fetch_add(to_add, Ordering::Release);
        }
        if dropped != 0 {
            self.dropped_total.fetch_add(dropped, Ordering::Relaxed);
        }

        self.update_active_vus();
        self.notify.notify_waiters();
    }

    fn update_active_vus(&self) {
        let backlog = self.backlog();

        // Keep at least `pre_allocated_vus`; with a backlog, raise to backlog+1 (up to max).
        let desired = if backlog == 0 {
            self.pre_allocated_vus
        } else {
            self.pre_allocated_vus.max(backlog.saturating_add(1))
        };

        let desired = desired.clamp(1, self.max_vus.max(1));
        self.active_vus.store(desired, Ordering::Relaxed);
    }

    /// Claim one due iteration. Returns `false` once the pacer is done.
    pub async fn claim_next(&self) -> bool {
        loop {
            // Register for wakeups before inspecting state so `mark_done` cannot be missed.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if self.is_done() {
                return false;
            }

            let claimed = self.claimed_total.load(Ordering::Acquire);
            let scheduled = self.scheduled_total.load(Ordering::Acquire);

            if claimed < scheduled {
                if self
                    .claimed_total
                    .compare_exchange_weak(
                        claimed,
                        claimed.saturating_add(1),
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return true;
                }
                continue;
            }

            notified.await;
        }
    }

    /// Wait for the next scheduling tick (or for the pacer to finish).
    pub async fn wait_for_update(&self) {
        let mut notified = pin!(self.notify.notified());
        notified.as_mut().enable();

        if self.is_done() {
            return;
        }

        notified.await;
    }
}
