use std::io::Write as _;
use std::process::Command;

use anyhow::Context as _;
use serde::Deserialize;
use surge_testserver::TestServer;

#[derive(Debug, Deserialize)]
struct Check {
    name: String,
    passes: u64,
    fails: u64,
}

#[derive(Debug, Deserialize)]
struct SummaryLine {
    scenario: String,
    requests_total: u64,
    iterations_total: u64,
    checks_total: u64,
    checks_failed_total: u64,
    checks: Vec<Check>,
}

#[derive(Debug, Deserialize)]
struct ProgressLine {
    tick: u64,
    max_vus: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum JsonLine {
    #[serde(rename = "progress")]
    Progress(ProgressLine),

    #[serde(rename = "summary")]
    Summary(SummaryLine),
}

fn surge() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_surge"));
    cmd.env_remove("SURGE_URL").env_remove("RUST_LOG");
    cmd
}

fn parse_lines(stdout: &[u8]) -> anyhow::Result<Vec<JsonLine>> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("parse json line: {l}")))
        .collect()
}

#[tokio::test]
async fn json_output_matches_server_observed_requests() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let url = server.urls().restaurants.clone();

    // Long enough for at least one progress tick.
    let out = tokio::task::spawn_blocking(move || {
        surge()
            .arg("run")
            .args(["--url", &url])
            .args(["--start-rate", "20", "--stage", "20:1500ms"])
            .args(["--pre-allocated-vus", "4", "--max-vus", "8"])
            .args(["--timeout", "5s", "--output", "json"])
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run surge binary")?;

    let served = server.stats().requests_total();
    server.shutdown().await;

    anyhow::ensure!(
        out.status.success(),
        "surge failed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    let lines = parse_lines(&out.stdout)?;

    let progress: Vec<&ProgressLine> = lines
        .iter()
        .filter_map(|l| match l {
            JsonLine::Progress(p) => Some(p),
            JsonLine::Summary(_) => None,
        })
        .collect();
    anyhow::ensure!(!progress.is_empty(), "expected progress lines");
    anyhow::ensure!(progress[0].tick == 1, "ticks start at 1");
    anyhow::ensure!(progress.iter().all(|p| p.max_vus == 8));

    let Some(JsonLine::Summary(summary)) = lines.last() else {
        anyhow::bail!("last line is not a summary");
    };
    anyhow::ensure!(summary.scenario == "ramping_test");
    anyhow::ensure!(summary.iterations_total > 0);
    anyhow::ensure!(
        summary.requests_total == served,
        "summary requests {} != server observed {served}",
        summary.requests_total
    );
    anyhow::ensure!(summary.checks_total == summary.iterations_total);
    anyhow::ensure!(summary.checks_failed_total == 0);
    anyhow::ensure!(summary.checks.len() == 1);
    anyhow::ensure!(summary.checks[0].name == "is status 200");
    anyhow::ensure!(summary.checks[0].passes == summary.iterations_total);
    anyhow::ensure!(summary.checks[0].fails == 0);

    Ok(())
}

#[test]
fn config_prints_built_in_profile() -> anyhow::Result<()> {
    let out = surge().arg("config").output().context("run surge binary")?;
    anyhow::ensure!(out.status.success(), "surge config failed");

    let yaml = String::from_utf8_lossy(&out.stdout);
    for needle in [
        "name: ramping_test",
        "executor: ramping-arrival-rate",
        "startRate: 10",
        "timeUnit: 1s",
        "preAllocatedVUs: 100",
        "maxVUs: 100",
        "target: 30",
        "duration: 30s",
        "url: https://mainserver-fdhzgisj6a-de.a.run.app/api/v1/restaurants",
    ] {
        anyhow::ensure!(yaml.contains(needle), "missing `{needle}` in:\n{yaml}");
    }
    Ok(())
}

#[test]
fn config_layers_profile_then_flags() -> anyhow::Result<()> {
    let mut profile = tempfile::NamedTempFile::new().context("create temp profile")?;
    writeln!(
        profile,
        "startRate: 1\nmaxVUs: 300\ntarget:\n  url: http://localhost:8000/api/v1/restaurants"
    )
    .context("write temp profile")?;

    let out = surge()
        .arg("config")
        .arg("--config")
        .arg(profile.path())
        .args(["--max-vus", "250", "--stage", "50:1m"])
        .output()
        .context("run surge binary")?;
    anyhow::ensure!(
        out.status.success(),
        "surge config failed:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );

    let yaml = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(yaml.contains("startRate: 1\n"), "profile value lost:\n{yaml}");
    anyhow::ensure!(yaml.contains("maxVUs: 250"), "flag should win:\n{yaml}");
    anyhow::ensure!(yaml.contains("preAllocatedVUs: 100"), "built-in lost:\n{yaml}");
    anyhow::ensure!(yaml.contains("target: 50") && yaml.contains("duration: 1m"));
    anyhow::ensure!(yaml.contains("url: http://localhost:8000/api/v1/restaurants"));

    let rendered = tempfile::NamedTempFile::new().context("create rendered profile")?;
    std::fs::write(rendered.path(), yaml.as_bytes()).context("write rendered profile")?;
    let again = surge()
        .arg("config")
        .arg("--config")
        .arg(rendered.path())
        .output()
        .context("run surge binary")?;
    anyhow::ensure!(
        again.stdout == out.stdout,
        "rendered profile should be a fixed point"
    );

    Ok(())
}
