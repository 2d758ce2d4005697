use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use surge_http::HttpClient;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use super::config::{ScenarioConfig, ScenarioExecutor};
use super::error::Result;
use super::pacer::ArrivalPacer;
use super::progress::{LiveMetrics, ProgressFn, ProgressUpdate, ScenarioProgress, StageProgress};
use super::request::RequestPlan;
use super::schedule::RampingU64Schedule;
use super::stats::{RunStats, RunSummary};

const PACER_TICK: Duration = Duration::from_millis(10);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Counts iterations between claim and completion. Dropping the guard (including on abort)
/// releases the slot.
struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

struct VuContext {
    /// 1-based index within the pool; only VUs with `index <= active_vus` take work.
    index: u64,
    pacer: Arc<ArrivalPacer>,
    plan: Arc<RequestPlan>,
    client: HttpClient,
    stats: Arc<RunStats>,
    in_flight: Arc<AtomicU64>,
}

/// VU tasks spawned so far. The pool starts at `pre_allocated_vus` and grows with the
/// active window, never past `max_vus`.
struct VuPool {
    tasks: JoinSet<()>,
    spawned: u64,
    pacer: Arc<ArrivalPacer>,
    plan: Arc<RequestPlan>,
    client: HttpClient,
    stats: Arc<RunStats>,
    in_flight: Arc<AtomicU64>,
}

impl VuPool {
    fn grow_to(&mut self, vus: u64) {
        let vus = vus.min(self.pacer.max_vus());
        while self.spawned < vus {
            self.spawned += 1;
            self.tasks.spawn(run_vu(VuContext {
                index: self.spawned,
                pacer: self.pacer.clone(),
                plan: self.plan.clone(),
                client: self.client.clone(),
                stats: self.stats.clone(),
                in_flight: self.in_flight.clone(),
            }));
        }
    }

    /// Wait for every VU to exit. A panicked VU surfaces as a join error.
    async fn join_all(&mut self) -> std::result::Result<(), tokio::task::JoinError> {
        while let Some(res) = self.tasks.join_next().await {
            res?;
        }
        Ok(())
    }

    async fn abort_all(&mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
    }
}

async fn run_vu(ctx: VuContext) {
    loop {
        if ctx.pacer.is_done() {
            return;
        }

        if ctx.index > ctx.pacer.active_vus() {
            ctx.pacer.wait_for_update().await;
            continue;
        }

        if !ctx.pacer.claim_next().await {
            return;
        }

        let _guard = InFlight::enter(&ctx.in_flight);
        let outcome = ctx.plan.execute(&ctx.client, &ctx.stats).await;
        ctx.stats.record_iteration();
        tracing::trace!(
            vu = ctx.index,
            status = ?outcome.status,
            passed = outcome.passed(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "iteration done"
        );
    }
}

struct PacerContext {
    pacer: Arc<ArrivalPacer>,
    schedule: Arc<RampingU64Schedule>,
    time_unit: Duration,
    stats: Arc<RunStats>,
    started: Instant,
}

async fn run_pacer(ctx: PacerContext, pool: &mut VuPool) {
    let mut interval = tokio::time::interval(PACER_TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let tick_s = PACER_TICK.as_secs_f64();
    let unit_s = ctx.time_unit.as_secs_f64().max(1e-9);

    let mut carry = 0.0f64;
    let mut last_dropped = 0u64;

    loop {
        interval.tick().await;

        let elapsed = ctx.started.elapsed();
        if ctx.schedule.is_done(elapsed) {
            break;
        }

        let rate = ctx.schedule.target_at(elapsed) as f64;
        carry += rate * (tick_s / unit_s);
        let due = carry.floor() as u64;
        carry -= due as f64;

        ctx.pacer.update_due(due);
        pool.grow_to(ctx.pacer.active_vus());

        let dropped = ctx.pacer.dropped_total();
        ctx.stats
            .record_dropped_iterations(dropped.saturating_sub(last_dropped));
        last_dropped = dropped;
    }

    // Iterations still waiting for a VU at the end of the last stage are dropped, not drained.
    ctx.pacer.mark_done();
    let dropped = ctx.pacer.dropped_total();
    ctx.stats
        .record_dropped_iterations(dropped.saturating_sub(last_dropped));
}

#[derive(Debug, Default, Clone)]
struct LastTotals {
    requests_total: u64,
    failed_requests_total: u64,
    iterations_total: u64,
    bytes_received_total: u64,
    bytes_sent_total: u64,
    errors_total: HashMap<String, u64>,
}

struct ProgressContext {
    scenario: String,
    pacer: Arc<ArrivalPacer>,
    schedule: Arc<RampingU64Schedule>,
    time_unit: Duration,
    stats: Arc<RunStats>,
    started: Instant,
    progress: Option<ProgressFn>,
}

/// Samples per-second rates for the summary and, if requested, reports live progress.
async fn run_progress(ctx: ProgressContext) {
    let mut interval = tokio::time::interval_at(
        tokio::time::Instant::from_std(ctx.started) + PROGRESS_INTERVAL,
        PROGRESS_INTERVAL,
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stats = &ctx.stats;
    let mut tick_id: u64 = 0;
    let mut last_at = ctx.started;
    let mut last = LastTotals::default();

    loop {
        interval.tick().await;

        tick_id = tick_id.saturating_add(1);
        let now = Instant::now();
        let dt = now.duration_since(last_at);
        last_at = now;
        let secs = dt.as_secs_f64().max(1e-9);

        let requests_total = stats.requests_total();
        let delta_requests = requests_total.saturating_sub(last.requests_total);
        let rps_now = delta_requests as f64 / secs;
        stats.record_rps_sample(rps_now);

        let Some(progress) = ctx.progress.as_ref() else {
            last.requests_total = requests_total;
            continue;
        };

        let failed_requests_total = stats.failed_requests_total();
        let delta_failed = failed_requests_total.saturating_sub(last.failed_requests_total);
        let error_rate_now = if delta_requests == 0 {
            0.0
        } else {
            delta_failed as f64 / delta_requests as f64
        };

        let iterations_total = stats.iterations_total();
        let iterations_per_sec_now =
            iterations_total.saturating_sub(last.iterations_total) as f64 / secs;

        let bytes_received_total = stats.bytes_received_total();
        let bytes_received_per_sec_now = (bytes_received_total
            .saturating_sub(last.bytes_received_total) as f64
            / secs)
            .round() as u64;

        let bytes_sent_total = stats.bytes_sent_total();
        let bytes_sent_per_sec_now =
            (bytes_sent_total.saturating_sub(last.bytes_sent_total) as f64 / secs).round() as u64;

        let errors_total = stats.errors_snapshot();
        let errors_now: HashMap<String, u64> = errors_total
            .iter()
            .filter_map(|(k, total)| {
                let prev = last.errors_total.get(k).copied().unwrap_or(0);
                let delta = total.saturating_sub(prev);
                (delta != 0).then(|| (k.clone(), delta))
            })
            .collect();

        let (p50, p90, p95, p99) = stats.take_latency_window_ms();

        last = LastTotals {
            requests_total,
            failed_requests_total,
            iterations_total,
            bytes_received_total,
            bytes_sent_total,
            errors_total,
        };

        let elapsed = ctx.started.elapsed();
        let metrics = LiveMetrics {
            rps_now,
            iterations_per_sec_now,
            error_rate_now,
            bytes_received_per_sec_now,
            bytes_sent_per_sec_now,
            requests_total,
            failed_requests_total,
            iterations_total,
            checks_total: stats.checks_total(),
            checks_failed_total: stats.checks_failed_total(),
            latency_p50_ms_now: p50,
            latency_p90_ms_now: p90,
            latency_p95_ms_now: p95,
            latency_p99_ms_now: p99,
            errors_now,
        };

        (progress)(ProgressUpdate {
            tick: tick_id,
            elapsed,
            interval: dt,
            scenario: ctx.scenario.clone(),
            metrics,
            progress: ScenarioProgress::RampingArrivalRate {
                time_unit: ctx.time_unit,
                total_duration: ctx.schedule.total_duration(),
                stage: ctx
                    .schedule
                    .stage_snapshot_at(elapsed)
                    .map(StageProgress::from),
                active_vus: ctx.pacer.active_vus(),
                max_vus: ctx.pacer.max_vus(),
                dropped_iterations_total: ctx.pacer.dropped_total(),
            },
        });
    }
}

/// Run one scenario to completion and summarize it.
///
/// Iterations are started by the arrival-rate pacer and picked up by a pool of VU tasks
/// that starts at `pre_allocated_vus` and grows with the backlog up to `max_vus`.
/// When the last stage ends no new iterations start; iterations still
/// running get `graceful_stop` to finish, after which they are aborted and counted as
/// interrupted. Failed requests and checks are recorded in the summary, never returned
/// as errors.
pub async fn run_scenario(
    scenario: &ScenarioConfig,
    plan: Arc<RequestPlan>,
    client: HttpClient,
    progress: Option<ProgressFn>,
) -> Result<RunSummary> {
    let ScenarioExecutor::RampingArrivalRate {
        start_rate,
        time_unit,
        pre_allocated_vus,
        max_vus,
        stages,
    } = &scenario.executor;

    let stats = Arc::new(RunStats::default());
    let schedule = Arc::new(RampingU64Schedule::new(*start_rate, stages.clone()));
    let pacer = Arc::new(ArrivalPacer::new(*pre_allocated_vus, *max_vus));
    let in_flight = Arc::new(AtomicU64::new(0));

    tracing::info!(
        scenario = %scenario.name,
        url = %plan.target.url,
        start_rate,
        pre_allocated_vus,
        max_vus,
        duration_ms = schedule.total_duration().as_millis() as u64,
        "starting scenario"
    );

    let mut pool = VuPool {
        tasks: JoinSet::new(),
        spawned: 0,
        pacer: pacer.clone(),
        plan: plan.clone(),
        client,
        stats: stats.clone(),
        in_flight: in_flight.clone(),
    };
    pool.grow_to(*pre_allocated_vus);

    let started = Instant::now();

    let progress_handle = tokio::spawn(run_progress(ProgressContext {
        scenario: scenario.name.clone(),
        pacer: pacer.clone(),
        schedule: schedule.clone(),
        time_unit: *time_unit,
        stats: stats.clone(),
        started,
        progress,
    }));

    run_pacer(
        PacerContext {
            pacer: pacer.clone(),
            schedule: schedule.clone(),
            time_unit: *time_unit,
            stats: stats.clone(),
            started,
        },
        &mut pool,
    )
    .await;

    let drained = tokio::time::timeout(scenario.graceful_stop, pool.join_all()).await;
    match drained {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            pool.abort_all().await;
            progress_handle.abort();
            return Err(err.into());
        }
        Err(_) => {
            let interrupted = in_flight.load(Ordering::Acquire);
            tracing::warn!(
                interrupted,
                graceful_stop_ms = scenario.graceful_stop.as_millis() as u64,
                "graceful stop expired; interrupting running iterations"
            );
            stats.record_interrupted_iterations(interrupted);
            pool.abort_all().await;
        }
    }

    progress_handle.abort();
    let _ = progress_handle.await;

    let dropped = stats.dropped_iterations_total();
    if dropped != 0 {
        tracing::warn!(
            dropped,
            max_vus,
            spawned_vus = pool.spawned,
            "insufficient VUs; some iterations were not started"
        );
    }

    let summary = stats.summarize(&scenario.name, started.elapsed());
    tracing::info!(
        scenario = %scenario.name,
        iterations = summary.iterations_total,
        requests = summary.requests_total,
        checks_failed = summary.checks_failed,
        elapsed_ms = summary.run_duration.as_millis() as u64,
        "scenario finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_releases_on_drop() {
        let counter = AtomicU64::new(0);
        {
            let _a = InFlight::enter(&counter);
            let _b = InFlight::enter(&counter);
            assert_eq!(counter.load(Ordering::Acquire), 2);
        }
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn pool_grows_lazily_and_stops_at_max_vus() {
        let pacer = Arc::new(ArrivalPacer::new(2, 4));
        let mut pool = VuPool {
            tasks: JoinSet::new(),
            spawned: 0,
            pacer: pacer.clone(),
            plan: Arc::new(RequestPlan::new(crate::Target {
                url: "http://127.0.0.1:9/".to_string(),
                timeout: Some(Duration::from_millis(200)),
            })),
            client: HttpClient::default(),
            stats: Arc::new(RunStats::default()),
            in_flight: Arc::new(AtomicU64::new(0)),
        };

        pool.grow_to(2);
        assert_eq!(pool.spawned, 2);
        pool.grow_to(1);
        assert_eq!(pool.spawned, 2);
        pool.grow_to(1_000_000);
        assert_eq!(pool.spawned, 4);
        assert_eq!(pool.tasks.len(), 4);

        pacer.mark_done();
        tokio::time::timeout(Duration::from_secs(1), pool.join_all())
            .await
            .unwrap_or_else(|_| panic!("idle pool did not exit"))
            .unwrap_or_else(|e| panic!("join: {e}"));
    }

    #[tokio::test]
    async fn inactive_vus_do_not_take_work() {
        let pacer = Arc::new(ArrivalPacer::new(1, 2));
        let stats = Arc::new(RunStats::default());
        let in_flight = Arc::new(AtomicU64::new(0));
        let plan = Arc::new(RequestPlan::new(crate::Target {
            url: "http://127.0.0.1:9/".to_string(),
            timeout: Some(Duration::from_millis(200)),
        }));

        let idle = tokio::spawn(run_vu(VuContext {
            index: 2,
            pacer: pacer.clone(),
            plan,
            client: HttpClient::default(),
            stats: stats.clone(),
            in_flight,
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        pacer.mark_done();

        tokio::time::timeout(Duration::from_secs(1), idle)
            .await
            .unwrap_or_else(|_| panic!("idle VU did not exit"))
            .unwrap_or_else(|e| panic!("join: {e}"));
        assert_eq!(stats.iterations_total(), 0);
    }
}
