use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_bytes, format_duration, format_ms_opt, format_rate};
use progress::HumanProgress;
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

fn progress_message(u: &surge_core::ProgressUpdate) -> String {
    let m = &u.metrics;
    let surge_core::ScenarioProgress::RampingArrivalRate {
        stage,
        active_vus,
        max_vus,
        dropped_iterations_total,
        ..
    } = &u.progress;

    let mut msg = format!(
        "vus={active_vus}/{max_vus} dropped={dropped_iterations_total} elapsed={} iters/s={} rps={} p95={} tps={}/s checks_failed={}",
        format_duration(u.elapsed),
        format_rate(m.iterations_per_sec_now),
        format_rate(m.rps_now),
        format_ms_opt(m.latency_p95_ms_now),
        format_bytes(
            m.bytes_received_per_sec_now
                .saturating_add(m.bytes_sent_per_sec_now)
        ),
        m.checks_failed_total
    );

    if let Some(stage) = stage {
        msg.push_str(&format!(
            " stage={}/{} target={}",
            stage.stage, stage.stages, stage.current_target
        ));
    }

    msg
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, scenario: &surge_core::ScenarioConfig) {
        let surge_core::ScenarioExecutor::RampingArrivalRate {
            start_rate,
            time_unit,
            pre_allocated_vus,
            max_vus,
            stages,
        } = &scenario.executor;

        println!("target: GET {}", scenario.target.url);
        println!(
            "scenario: {} executor=ramping-arrival-rate start_rate={start_rate}/{} vus={pre_allocated_vus}..{max_vus} duration={} graceful_stop={}",
            scenario.name,
            format_duration(*time_unit),
            format_duration(scenario.total_duration()),
            format_duration(scenario.graceful_stop),
        );
        for (i, st) in stages.iter().enumerate() {
            println!(
                "  stage {}: target={} over {}",
                i + 1,
                st.target,
                format_duration(st.duration)
            );
        }
        println!();
    }

    fn progress(&self) -> Option<surge_core::ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u| {
            let surge_core::ScenarioProgress::RampingArrivalRate { total_duration, .. } =
                &u.progress;
            progress.update(&u.scenario, *total_duration, u.elapsed, progress_message(&u));
        }))
    }

    fn print_summary(&self, summary: &surge_core::RunSummary) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary));
        Ok(())
    }
}
