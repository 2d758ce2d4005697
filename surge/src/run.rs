use anyhow::Context as _;
use std::sync::Arc;

use surge_core::{
    HttpClient, RequestPlan, RunConfig, ScenarioConfig, ScenarioOptions, scenario_from_options,
};

use crate::cli::{ConfigArgs, RunArgs, ScenarioArgs};
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::scenario_yaml::{read_profile, render_profile};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let scenario = resolve_scenario(&args.scenario)
        .await
        .map_err(RunError::InvalidInput)?;

    let out = output::formatter(args.output);
    out.print_header(&scenario);

    let plan = Arc::new(RequestPlan::new(scenario.target.clone()));
    let summary = surge_core::run_scenario(&scenario, plan, HttpClient::default(), out.progress())
        .await
        .context("run failed")
        .map_err(RunError::RuntimeError)?;

    out.print_summary(&summary)
        .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_checks(summary.checks_passed()))
}

pub async fn config(args: ConfigArgs) -> Result<ExitCode, RunError> {
    let scenario = resolve_scenario(&args.scenario)
        .await
        .map_err(RunError::InvalidInput)?;

    let yaml = render_profile(&scenario).map_err(RunError::RuntimeError)?;
    print!("{yaml}");
    Ok(ExitCode::Success)
}

/// Built-in profile, then the YAML profile (if any), then CLI flags.
async fn resolve_scenario(args: &ScenarioArgs) -> anyhow::Result<ScenarioConfig> {
    let mut opts = ScenarioOptions::ramping_test();
    if let Some(path) = &args.config {
        opts = opts.overlay(read_profile(path).await?);
    }

    let scenario =
        scenario_from_options(opts, run_config(args)).context("invalid scenario config")?;
    tracing::debug!(?scenario, "resolved scenario");
    Ok(scenario)
}

fn run_config(args: &ScenarioArgs) -> RunConfig {
    RunConfig {
        url: args.url.clone(),
        timeout: args.timeout,
        start_rate: args.start_rate,
        time_unit: args.time_unit,
        pre_allocated_vus: args.pre_allocated_vus,
        max_vus: args.max_vus,
        stages: args.stages.clone(),
        graceful_stop: args.graceful_stop,
    }
}
