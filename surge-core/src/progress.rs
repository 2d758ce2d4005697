use std::collections::HashMap;
use std::time::Duration;

use super::schedule::StageSnapshot;

#[derive(Debug, Clone)]
pub struct LiveMetrics {
    /// Requests/sec observed during the last progress interval.
    pub rps_now: f64,

    /// Iterations/sec observed during the last progress interval.
    pub iterations_per_sec_now: f64,

    /// Failed requests / total requests during the last progress interval (0..=1).
    pub error_rate_now: f64,

    pub bytes_received_per_sec_now: u64,
    pub bytes_sent_per_sec_now: u64,

    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub iterations_total: u64,
    pub checks_total: u64,
    pub checks_failed_total: u64,

    /// Window latency percentiles (milliseconds); `None` when no response completed.
    pub latency_p50_ms_now: Option<f64>,
    pub latency_p90_ms_now: Option<f64>,
    pub latency_p95_ms_now: Option<f64>,
    pub latency_p99_ms_now: Option<f64>,

    /// Error breakdown during the last progress interval.
    pub errors_now: HashMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

impl From<StageSnapshot> for StageProgress {
    fn from(st: StageSnapshot) -> Self {
        Self {
            stage: st.index + 1,
            stages: st.count,
            stage_elapsed: st.stage_elapsed,
            stage_remaining: st.stage_remaining,
            start_target: st.start_target,
            end_target: st.end_target,
            current_target: st.current_target,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScenarioProgress {
    RampingArrivalRate {
        time_unit: Duration,
        total_duration: Duration,
        stage: Option<StageProgress>,
        active_vus: u64,
        max_vus: u64,
        dropped_iterations_total: u64,
    },
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based).
    pub tick: u64,
    pub elapsed: Duration,
    /// Wall time covered by this update's `*_now` metrics.
    pub interval: Duration,
    pub scenario: String,
    pub metrics: LiveMetrics,
    pub progress: ScenarioProgress,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
