mod check;
mod config;
mod error;
mod pacer;
mod progress;
mod request;
mod run;
mod schedule;
mod stats;

pub use check::Check;
pub use config::{
    DEFAULT_GRACEFUL_STOP, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SCENARIO_NAME, DEFAULT_TARGET_URL,
    RunConfig, ScenarioConfig, ScenarioExecutor, ScenarioExecutorKind, ScenarioOptions, Stage,
    Target, scenario_from_options,
};
pub use error::{Error, Result};
pub use pacer::ArrivalPacer;
pub use progress::{LiveMetrics, ProgressFn, ProgressUpdate, ScenarioProgress, StageProgress};
pub use request::{IterationOutcome, RequestPlan};
pub use run::run_scenario;
pub use schedule::{RampingU64Schedule, StageSnapshot};
pub use stats::{CheckSummary, LatencySummary, RunStats, RunSummary};
pub use surge_http::{HttpClient, HttpResponse, HttpTransportErrorKind};
