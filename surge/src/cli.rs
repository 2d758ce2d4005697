use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use surge_core::Stage;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    // Bare integers are seconds.
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_stage(input: &str) -> Result<Stage, String> {
    let s = input.trim();
    let (target, duration) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid stage '{s}' (expected TARGET:DURATION, e.g. 30:30s)"))?;

    let target: u64 = target
        .trim()
        .parse()
        .map_err(|_| format!("invalid stage target '{target}' (expected a non-negative integer)"))?;
    let duration = parse_duration(duration)?;

    Ok(Stage { duration, target })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar on stderr, text summary on stdout.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "surge",
    author,
    version,
    about = "Ramping arrival-rate load test for the restaurants API",
    long_about = "surge drives GET requests against a single endpoint at a ramping arrival rate and checks that every response is `200`.\n\nWith no flags it runs the built-in `ramping_test` profile: 10 -> 30 iterations/s over 30s, a pool of 100 VUs, against the restaurants API.",
    after_help = "Examples:\n  surge run\n  surge run --url http://localhost:8000/api/v1/restaurants --stage 30:30s\n  surge run --config profile.yaml --output json\n  surge config --max-vus 200 > profile.yaml"
)]
pub struct Cli {
    /// Log filter (e.g. `info`, `surge_core=debug`). Falls back to RUST_LOG, then `warn`.
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the load test
    #[command(
        long_about = "Run the scenario until its last stage ends, then wait up to the graceful stop for running iterations.\n\nCLI flags override the YAML profile, which overrides the built-in profile."
    )]
    Run(RunArgs),

    /// Print the resolved scenario profile as YAML
    Config(ConfigArgs),
}

/// Scenario overrides shared by `run` and `config`.
#[derive(Debug, Args)]
pub struct ScenarioArgs {
    /// YAML profile to layer over the built-in profile
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target URL
    #[arg(long, env = "SURGE_URL")]
    pub url: Option<String>,

    /// Per-request timeout (e.g. 60s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Iterations per time unit at the start of the first stage
    #[arg(long)]
    pub start_rate: Option<u64>,

    /// Time unit for rates (e.g. 1s, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub time_unit: Option<Duration>,

    /// VUs available from the start
    #[arg(long = "pre-allocated-vus")]
    pub pre_allocated_vus: Option<u64>,

    /// Upper bound on VUs
    #[arg(long = "max-vus")]
    pub max_vus: Option<u64>,

    /// Ramp stage, repeatable (replaces all profile stages)
    #[arg(long = "stage", value_name = "TARGET:DURATION", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Time allowed for running iterations after the last stage
    #[arg(long, value_parser = parse_duration)]
    pub graceful_stop: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
}
