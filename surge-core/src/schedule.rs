use std::time::Duration;

use super::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear target over time: each stage ramps from the previous target
/// (or `start` for the first stage) to its own target.
#[derive(Debug, Clone)]
pub struct RampingU64Schedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

struct StageBounds {
    index: usize,
    start: Duration,
    end: Duration,
    start_target: u64,
    end_target: u64,
}

impl RampingU64Schedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    // Callers guarantee `stages` is non-empty and `elapsed < total_duration()`.
    fn bounds_at(&self, elapsed: Duration) -> StageBounds {
        let index = match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            // An exact hit on a boundary belongs to the next stage.
            Ok(i) => (i + 1).min(self.stages.len() - 1),
            Err(i) => i,
        };

        StageBounds {
            index,
            start: if index == 0 {
                Duration::ZERO
            } else {
                self.cumulative_ends[index - 1]
            },
            end: self.cumulative_ends[index],
            start_target: if index == 0 {
                self.start
            } else {
                self.stages[index - 1].target
            },
            end_target: self.stages[index].target,
        }
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if self.stages.is_empty() || elapsed.is_zero() {
            return self.start;
        }

        if elapsed >= self.total_duration() {
            return self.stages.last().map(|s| s.target).unwrap_or(self.start);
        }

        let b = self.bounds_at(elapsed);
        let stage_duration = b.end.saturating_sub(b.start);
        if stage_duration.is_zero() {
            return b.end_target;
        }

        // Linear interpolation across the stage.
        let start_i = b.start_target as i128;
        let delta = b.end_target as i128 - start_i;

        let num = elapsed.saturating_sub(b.start).as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_i + (delta.saturating_mul(num) / den.max(1));
        cur.clamp(0, u64::MAX as i128) as u64
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.stages.is_empty() {
            return None;
        }

        let total = self.total_duration();
        if elapsed >= total {
            let last = self.stages.len() - 1;
            return Some(StageSnapshot {
                index: last,
                count: self.stages.len(),
                stage_elapsed: self.stages[last].duration,
                stage_remaining: Duration::ZERO,
                start_target: if last == 0 {
                    self.start
                } else {
                    self.stages[last - 1].target
                },
                end_target: self.stages[last].target,
                current_target: self.stages[last].target,
            });
        }

        let b = self.bounds_at(elapsed);
        let stage_elapsed = elapsed.saturating_sub(b.start);

        Some(StageSnapshot {
            index: b.index,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: b.end.saturating_sub(b.start).saturating_sub(stage_elapsed),
            start_target: b.start_target,
            end_target: b.end_target,
            current_target: self.target_at(elapsed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn restaurants_ramp() -> RampingU64Schedule {
        RampingU64Schedule::new(
            10,
            vec![Stage {
                duration: secs(30),
                target: 30,
            }],
        )
    }

    #[test]
    fn interpolates_linearly_within_a_stage() {
        let s = restaurants_ramp();
        assert_eq!(s.target_at(Duration::ZERO), 10);
        assert_eq!(s.target_at(secs(15)), 20);
        assert_eq!(s.target_at(secs(30)), 30);
        assert_eq!(s.target_at(secs(45)), 30);
        assert_eq!(s.total_duration(), secs(30));
        assert!(!s.is_done(secs(29)));
        assert!(s.is_done(secs(30)));
    }

    #[test]
    fn multi_stage_ramp_up_hold_and_down() {
        let s = RampingU64Schedule::new(
            0,
            vec![
                Stage {
                    duration: secs(10),
                    target: 100,
                },
                Stage {
                    duration: secs(10),
                    target: 100,
                },
                Stage {
                    duration: secs(10),
                    target: 0,
                },
            ],
        );

        assert_eq!(s.target_at(secs(5)), 50);
        assert_eq!(s.target_at(secs(10)), 100);
        assert_eq!(s.target_at(secs(15)), 100);
        assert_eq!(s.target_at(secs(25)), 50);
        assert_eq!(s.target_at(secs(30)), 0);
    }

    #[test]
    fn zero_length_stage_jumps_to_its_target() {
        let s = RampingU64Schedule::new(
            5,
            vec![
                Stage {
                    duration: Duration::ZERO,
                    target: 50,
                },
                Stage {
                    duration: secs(10),
                    target: 50,
                },
            ],
        );

        assert_eq!(s.target_at(Duration::from_millis(1)), 50);
        assert_eq!(s.target_at(secs(5)), 50);
    }

    #[test]
    fn snapshot_reports_stage_position() {
        let s = restaurants_ramp();

        let snap = s
            .stage_snapshot_at(secs(12))
            .unwrap_or_else(|| panic!("expected a snapshot"));
        assert_eq!(snap.index, 0);
        assert_eq!(snap.count, 1);
        assert_eq!(snap.stage_elapsed, secs(12));
        assert_eq!(snap.stage_remaining, secs(18));
        assert_eq!(snap.start_target, 10);
        assert_eq!(snap.end_target, 30);
        assert_eq!(snap.current_target, 18);

        let done = s
            .stage_snapshot_at(secs(40))
            .unwrap_or_else(|| panic!("expected a snapshot"));
        assert_eq!(done.stage_remaining, Duration::ZERO);
        assert_eq!(done.current_target, 30);
    }

    #[test]
    fn empty_schedule_holds_start() {
        let s = RampingU64Schedule::new(7, Vec::new());
        assert_eq!(s.target_at(secs(3)), 7);
        assert!(s.stage_snapshot_at(secs(3)).is_none());
        assert!(s.is_done(Duration::ZERO));
    }
}
