use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use surge_core::{ScenarioConfig, ScenarioExecutor, ScenarioOptions, Stage};

/// On-disk scenario profile. Keys follow k6's camelCase option names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ProfileYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Executor kind: ramping-arrival-rate (alias ramping-rps)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_rate: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_unit: Option<YamlDuration>,

    #[serde(rename = "preAllocatedVUs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_allocated_vus: Option<u64>,

    #[serde(rename = "maxVUs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_vus: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub graceful_stop: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stages: Vec<StageYaml>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<TargetYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub target: u64,
    pub duration: YamlDuration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TargetYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<YamlDuration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl From<Duration> for YamlDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl From<YamlDuration> for Duration {
    fn from(value: YamlDuration) -> Self {
        value.0
    }
}

impl Serialize for YamlDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(self.0).to_string())
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(|_| E::custom("duration must be a non-negative, finite number"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                humantime::parse_duration(v.trim())
                    .map(YamlDuration)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_any(V)
    }
}

impl From<ProfileYaml> for ScenarioOptions {
    fn from(p: ProfileYaml) -> Self {
        let target = p.target.unwrap_or_default();
        Self {
            name: p.name,
            executor: p.executor,
            start_rate: p.start_rate,
            time_unit: p.time_unit.map(Into::into),
            pre_allocated_vus: p.pre_allocated_vus,
            max_vus: p.max_vus,
            stages: p
                .stages
                .into_iter()
                .map(|s| Stage {
                    duration: s.duration.into(),
                    target: s.target,
                })
                .collect(),
            graceful_stop: p.graceful_stop.map(Into::into),
            url: target.url,
            timeout: target.timeout.map(Into::into),
        }
    }
}

impl From<&ScenarioConfig> for ProfileYaml {
    fn from(s: &ScenarioConfig) -> Self {
        let ScenarioExecutor::RampingArrivalRate {
            start_rate,
            time_unit,
            pre_allocated_vus,
            max_vus,
            stages,
        } = &s.executor;

        Self {
            name: Some(s.name.clone()),
            executor: Some(surge_core::ScenarioExecutorKind::RampingArrivalRate.to_string()),
            start_rate: Some(*start_rate),
            time_unit: Some((*time_unit).into()),
            pre_allocated_vus: Some(*pre_allocated_vus),
            max_vus: Some(*max_vus),
            graceful_stop: Some(s.graceful_stop.into()),
            stages: stages
                .iter()
                .map(|st| StageYaml {
                    target: st.target,
                    duration: st.duration.into(),
                })
                .collect(),
            target: Some(TargetYaml {
                url: Some(s.target.url.clone()),
                timeout: s.target.timeout.map(Into::into),
            }),
        }
    }
}

pub(crate) fn parse_profile(yaml: &str) -> anyhow::Result<ScenarioOptions> {
    let profile: ProfileYaml = serde_yaml::from_str(yaml).context("invalid profile YAML")?;
    Ok(profile.into())
}

pub(crate) async fn read_profile(path: &Path) -> anyhow::Result<ScenarioOptions> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read profile: {}", path.display()))?;
    parse_profile(&yaml).with_context(|| format!("in profile: {}", path.display()))
}

pub(crate) fn render_profile(scenario: &ScenarioConfig) -> anyhow::Result<String> {
    serde_yaml::to_string(&ProfileYaml::from(scenario)).context("failed to serialize profile")
}
