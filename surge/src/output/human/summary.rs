use std::fmt::Write as _;

use surge_core::RunSummary;

use super::format::{format_bytes, format_duration, format_ms, format_pct, format_rate};

pub(crate) fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    writeln!(out, "summary: {}", summary.scenario).ok();

    let checks_passed = summary.checks_total.saturating_sub(summary.checks_failed);
    writeln!(
        out,
        "  checks: {checks_passed}/{} passed ({})",
        summary.checks_total,
        format_pct(checks_passed, summary.checks_total)
    )
    .ok();
    for check in &summary.checks_by_name {
        let mark = if check.failed == 0 { "ok  " } else { "FAIL" };
        writeln!(
            out,
            "    {mark} {}: {} passed, {} failed",
            check.name,
            check.passed(),
            check.failed
        )
        .ok();
    }

    writeln!(
        out,
        "  iterations: {} (dropped {}, interrupted {})",
        summary.iterations_total,
        summary.dropped_iterations_total,
        summary.interrupted_iterations_total
    )
    .ok();

    writeln!(
        out,
        "  requests: {} (failed {}) rate={}/s",
        summary.requests_total,
        summary.failed_requests_total,
        format_rate(summary.rps)
    )
    .ok();

    if !summary.errors.is_empty() {
        out.push_str("  errors:\n");
        // Most frequent first.
        let mut errors: Vec<_> = summary.errors.iter().collect();
        errors.sort_by(|(a_key, a), (b_key, b)| b.cmp(a).then_with(|| a_key.cmp(b_key)));
        for (key, count) in errors {
            writeln!(out, "    {key}: {count}").ok();
        }
    }

    match &summary.latency {
        Some(l) => {
            writeln!(
                out,
                "  latency: p50={} p90={} p95={} p99={} mean={} max={} (n={})",
                format_ms(l.p50),
                format_ms(l.p90),
                format_ms(l.p95),
                format_ms(l.p99),
                format_ms(l.mean),
                format_ms(l.max),
                l.count
            )
            .ok();
        }
        None => out.push_str("  latency: n/a\n"),
    }

    if summary.req_per_sec_max > 0.0 {
        writeln!(
            out,
            "  req/s: avg={} stdev={} max={} (+/- {:.2}%)",
            format_rate(summary.req_per_sec_avg),
            format_rate(summary.req_per_sec_stdev),
            format_rate(summary.req_per_sec_max),
            summary.req_per_sec_stdev_pct
        )
        .ok();
    }

    writeln!(
        out,
        "  bytes: recv {} sent {}",
        format_bytes(summary.bytes_received_total),
        format_bytes(summary.bytes_sent_total)
    )
    .ok();
    writeln!(out, "  duration: {}", format_duration(summary.run_duration)).ok();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use surge_core::{CheckSummary, LatencySummary};

    fn summary() -> RunSummary {
        RunSummary {
            scenario: "ramping_test".to_string(),
            requests_total: 600,
            failed_requests_total: 12,
            iterations_total: 600,
            dropped_iterations_total: 3,
            interrupted_iterations_total: 0,
            checks_total: 600,
            checks_failed: 12,
            checks_by_name: vec![CheckSummary {
                name: "is status 200".to_string(),
                total: 600,
                failed: 12,
            }],
            errors: BTreeMap::from([
                ("http_error:timeout".to_string(), 2),
                ("http_status:503".to_string(), 10),
            ]),
            bytes_received_total: 4096,
            bytes_sent_total: 1024,
            run_duration: Duration::from_secs(30),
            rps: 20.0,
            req_per_sec_avg: 20.0,
            req_per_sec_stdev: 5.0,
            req_per_sec_max: 30.0,
            req_per_sec_stdev_pct: 25.0,
            latency: Some(LatencySummary {
                p50: 12.0,
                p75: 15.0,
                p90: 20.0,
                p95: 25.0,
                p99: 40.0,
                min: 5.0,
                max: 120.0,
                mean: 13.5,
                stdev: 4.0,
                count: 588,
            }),
        }
    }

    #[test]
    fn renders_checks_errors_and_latency() {
        let text = render(&summary());

        assert!(text.starts_with("summary: ramping_test\n"));
        assert!(text.contains("  checks: 588/600 passed (98.00%)"));
        assert!(text.contains("    FAIL is status 200: 588 passed, 12 failed"));
        assert!(text.contains("  iterations: 600 (dropped 3, interrupted 0)"));
        assert!(text.contains("  requests: 600 (failed 12) rate=20.0/s"));
        assert!(text.contains("p95=25.00ms"));
        assert!(text.contains("  duration: 30s"));

        let status = text
            .find("http_status:503: 10")
            .unwrap_or_else(|| panic!("missing status error:\n{text}"));
        let timeout = text
            .find("http_error:timeout: 2")
            .unwrap_or_else(|| panic!("missing timeout error:\n{text}"));
        assert!(status < timeout, "errors should be sorted by count");
    }

    #[test]
    fn empty_run_has_no_latency() {
        let mut s = summary();
        s.latency = None;
        s.errors.clear();
        s.req_per_sec_max = 0.0;

        let text = render(&s);
        assert!(text.contains("  latency: n/a"));
        assert!(!text.contains("errors:"));
        assert!(!text.contains("req/s:"));
    }
}
