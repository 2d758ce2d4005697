use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _scenario: &surge_core::ScenarioConfig) {}

    fn progress(&self) -> Option<surge_core::ProgressFn> {
        Some(Arc::new(move |u| {
            emit_json_line(&build_progress_line(&u));
        }))
    }

    fn print_summary(&self, summary: &surge_core::RunSummary) -> anyhow::Result<()> {
        emit_json_line(&build_summary_line(summary));
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonStageProgress {
    pub stage: usize,
    pub stages: usize,
    pub current_target: u64,
    pub stage_remaining_secs: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub scenario: String,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub interval_secs: f64,

    pub active_vus: u64,
    pub max_vus: u64,
    pub dropped_iterations_total: u64,
    pub stage: Option<JsonStageProgress>,

    pub requests_per_sec: f64,
    pub iterations_per_sec: f64,
    pub error_rate: f64,
    pub bytes_received_per_sec: u64,
    pub bytes_sent_per_sec: u64,

    pub total_requests: u64,
    pub failed_requests_total: u64,
    pub iterations_total: u64,
    pub checks_total: u64,
    pub checks_failed_total: u64,

    pub latency_p50_ms: Option<f64>,
    pub latency_p90_ms: Option<f64>,
    pub latency_p95_ms: Option<f64>,
    pub latency_p99_ms: Option<f64>,

    pub errors: BTreeMap<String, u64>,
}

fn build_progress_line(u: &surge_core::ProgressUpdate) -> JsonProgressLine {
    let surge_core::ScenarioProgress::RampingArrivalRate {
        stage,
        active_vus,
        max_vus,
        dropped_iterations_total,
        ..
    } = &u.progress;
    let m = &u.metrics;

    JsonProgressLine {
        kind: "progress",
        scenario: u.scenario.clone(),
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        interval_secs: u.interval.as_secs_f64(),

        active_vus: *active_vus,
        max_vus: *max_vus,
        dropped_iterations_total: *dropped_iterations_total,
        stage: stage.as_ref().map(|s| JsonStageProgress {
            stage: s.stage,
            stages: s.stages,
            current_target: s.current_target,
            stage_remaining_secs: s.stage_remaining.as_secs_f64(),
        }),

        requests_per_sec: m.rps_now,
        iterations_per_sec: m.iterations_per_sec_now,
        error_rate: m.error_rate_now,
        bytes_received_per_sec: m.bytes_received_per_sec_now,
        bytes_sent_per_sec: m.bytes_sent_per_sec_now,

        total_requests: m.requests_total,
        failed_requests_total: m.failed_requests_total,
        iterations_total: m.iterations_total,
        checks_total: m.checks_total,
        checks_failed_total: m.checks_failed_total,

        latency_p50_ms: m.latency_p50_ms_now,
        latency_p90_ms: m.latency_p90_ms_now,
        latency_p95_ms: m.latency_p95_ms_now,
        latency_p99_ms: m.latency_p99_ms_now,

        errors: m.errors_now.iter().map(|(k, v)| (k.clone(), *v)).collect(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonCheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub scenario: String,
    pub duration_secs: f64,

    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub requests_per_sec: f64,
    pub iterations_total: u64,
    pub dropped_iterations_total: u64,
    pub interrupted_iterations_total: u64,

    pub checks_total: u64,
    pub checks_failed_total: u64,
    pub checks: Vec<JsonCheckSummary>,
    pub errors: BTreeMap<String, u64>,

    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,

    pub req_per_sec_avg: f64,
    pub req_per_sec_stdev: f64,
    pub req_per_sec_max: f64,
    pub req_per_sec_stdev_pct: f64,

    /// Milliseconds.
    pub latency: Option<JsonLatencySummary>,
}

fn build_summary_line(s: &surge_core::RunSummary) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        scenario: s.scenario.clone(),
        duration_secs: s.run_duration.as_secs_f64(),

        requests_total: s.requests_total,
        failed_requests_total: s.failed_requests_total,
        requests_per_sec: s.rps,
        iterations_total: s.iterations_total,
        dropped_iterations_total: s.dropped_iterations_total,
        interrupted_iterations_total: s.interrupted_iterations_total,

        checks_total: s.checks_total,
        checks_failed_total: s.checks_failed,
        checks: s
            .checks_by_name
            .iter()
            .map(|c| JsonCheckSummary {
                name: c.name.clone(),
                passes: c.passed(),
                fails: c.failed,
            })
            .collect(),
        errors: s.errors.clone(),

        bytes_received_total: s.bytes_received_total,
        bytes_sent_total: s.bytes_sent_total,

        req_per_sec_avg: s.req_per_sec_avg,
        req_per_sec_stdev: s.req_per_sec_stdev,
        req_per_sec_max: s.req_per_sec_max,
        req_per_sec_stdev_pct: s.req_per_sec_stdev_pct,

        latency: s.latency.as_ref().map(|l| JsonLatencySummary {
            p50: l.p50,
            p75: l.p75,
            p90: l.p90,
            p95: l.p95,
            p99: l.p99,
            min: l.min,
            max: l.max,
            mean: l.mean,
            stdev: l.stdev,
            count: l.count,
        }),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
