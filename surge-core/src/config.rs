use std::time::Duration;

use super::error::{Error, Result};

pub const DEFAULT_TARGET_URL: &str =
    "https://mainserver-fdhzgisj6a-de.a.run.app/api/v1/restaurants";
pub const DEFAULT_SCENARIO_NAME: &str = "ramping_test";
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

/// CLI-level overrides. Every `Some` (or non-empty `stages`) wins over the scenario options.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub url: Option<String>,
    pub timeout: Option<Duration>,
    pub start_rate: Option<u64>,
    pub time_unit: Option<Duration>,
    pub pre_allocated_vus: Option<u64>,
    pub max_vus: Option<u64>,
    pub stages: Vec<Stage>,
    pub graceful_stop: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioExecutor {
    /// Open-model arrival rate (iterations started per `time_unit`), with ramping stages.
    RampingArrivalRate {
        start_rate: u64,
        time_unit: Duration,
        pre_allocated_vus: u64,
        max_vus: u64,
        stages: Vec<Stage>,
    },
}

/// Scenario executor kind (the string form used by profiles/CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ScenarioExecutorKind {
    #[strum(to_string = "ramping-arrival-rate", serialize = "ramping-rps")]
    RampingArrivalRate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub name: String,
    pub executor: ScenarioExecutor,
    pub graceful_stop: Duration,
    pub target: Target,
}

impl ScenarioConfig {
    pub fn total_duration(&self) -> Duration {
        match &self.executor {
            ScenarioExecutor::RampingArrivalRate { stages, .. } => total_duration(stages),
        }
    }

    pub fn max_vus(&self) -> u64 {
        match &self.executor {
            ScenarioExecutor::RampingArrivalRate { max_vus, .. } => *max_vus,
        }
    }
}

/// Raw scenario options, as read from a profile file. Missing fields fall back to defaults
/// during [`scenario_from_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioOptions {
    pub name: Option<String>,
    pub executor: Option<String>,

    pub start_rate: Option<u64>,
    pub time_unit: Option<Duration>,
    pub pre_allocated_vus: Option<u64>,
    pub max_vus: Option<u64>,
    pub stages: Vec<Stage>,
    pub graceful_stop: Option<Duration>,

    pub url: Option<String>,
    pub timeout: Option<Duration>,
}

impl ScenarioOptions {
    /// The built-in restaurants ramp: 10 -> 30 iterations/s over 30s with a fixed pool of 100 VUs.
    pub fn ramping_test() -> Self {
        Self {
            name: Some(DEFAULT_SCENARIO_NAME.to_string()),
            executor: Some(ScenarioExecutorKind::RampingArrivalRate.to_string()),
            start_rate: Some(10),
            time_unit: Some(Duration::from_secs(1)),
            pre_allocated_vus: Some(100),
            max_vus: Some(100),
            stages: vec![Stage {
                duration: Duration::from_secs(30),
                target: 30,
            }],
            graceful_stop: Some(DEFAULT_GRACEFUL_STOP),
            url: Some(DEFAULT_TARGET_URL.to_string()),
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Layer `other` on top of `self`: fields set in `other` win.
    #[must_use]
    pub fn overlay(self, other: ScenarioOptions) -> Self {
        Self {
            name: other.name.or(self.name),
            executor: other.executor.or(self.executor),
            start_rate: other.start_rate.or(self.start_rate),
            time_unit: other.time_unit.or(self.time_unit),
            pre_allocated_vus: other.pre_allocated_vus.or(self.pre_allocated_vus),
            max_vus: other.max_vus.or(self.max_vus),
            stages: if other.stages.is_empty() {
                self.stages
            } else {
                other.stages
            },
            graceful_stop: other.graceful_stop.or(self.graceful_stop),
            url: other.url.or(self.url),
            timeout: other.timeout.or(self.timeout),
        }
    }
}

fn total_duration(stages: &[Stage]) -> Duration {
    stages
        .iter()
        .fold(Duration::ZERO, |acc, st| acc.saturating_add(st.duration))
}

pub fn scenario_from_options(opts: ScenarioOptions, cfg: RunConfig) -> Result<ScenarioConfig> {
    let executor_name = opts
        .executor
        .as_deref()
        .unwrap_or("ramping-arrival-rate");
    let executor_kind: ScenarioExecutorKind = executor_name
        .parse()
        .map_err(|_| Error::InvalidExecutor(executor_name.to_string()))?;

    let stages = if cfg.stages.is_empty() {
        opts.stages
    } else {
        cfg.stages
    };

    let url = cfg
        .url
        .or(opts.url)
        .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
    if url.trim().is_empty() {
        return Err(Error::InvalidUrl);
    }

    let timeout = cfg.timeout.or(opts.timeout).or(Some(DEFAULT_REQUEST_TIMEOUT));
    let graceful_stop = cfg
        .graceful_stop
        .or(opts.graceful_stop)
        .unwrap_or(DEFAULT_GRACEFUL_STOP);

    let executor = match executor_kind {
        ScenarioExecutorKind::RampingArrivalRate => {
            if stages.is_empty() || total_duration(&stages).is_zero() {
                return Err(Error::InvalidStages);
            }

            let start_rate = cfg.start_rate.or(opts.start_rate).unwrap_or(0);
            let time_unit = cfg
                .time_unit
                .or(opts.time_unit)
                .unwrap_or(Duration::from_secs(1));
            if time_unit.is_zero() {
                return Err(Error::InvalidTimeUnit);
            }

            let pre_allocated_vus = cfg
                .pre_allocated_vus
                .or(opts.pre_allocated_vus)
                .unwrap_or(1);
            if pre_allocated_vus == 0 {
                return Err(Error::InvalidPreAllocatedVus);
            }

            let max_vus = cfg.max_vus.or(opts.max_vus).unwrap_or(pre_allocated_vus);
            if max_vus < pre_allocated_vus {
                return Err(Error::InvalidMaxVus {
                    pre_allocated_vus,
                    max_vus,
                });
            }

            ScenarioExecutor::RampingArrivalRate {
                start_rate,
                time_unit,
                pre_allocated_vus,
                max_vus,
                stages,
            }
        }
    };

    Ok(ScenarioConfig {
        name: opts
            .name
            .unwrap_or_else(|| DEFAULT_SCENARIO_NAME.to_string()),
        executor,
        graceful_stop,
        target: Target { url, timeout },
    })
}
