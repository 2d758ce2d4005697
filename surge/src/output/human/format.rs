use std::time::Duration;

pub(crate) fn format_bytes(b: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    match b {
        b if b >= GIB => format!("{:.2}GiB", b as f64 / GIB as f64),
        b if b >= MIB => format!("{:.2}MiB", b as f64 / MIB as f64),
        b if b >= KIB => format!("{:.2}KiB", b as f64 / KIB as f64),
        b => format!("{b}B"),
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.1}")
    } else {
        "0.0".to_string()
    }
}

/// Milliseconds rendered in the largest unit that keeps a leading digit: `850us`, `12.35ms`, `1.20s`.
pub(crate) fn format_ms(ms: f64) -> String {
    if !ms.is_finite() || ms < 0.0 {
        return "n/a".to_string();
    }
    if ms >= 1000.0 {
        return format!("{:.2}s", ms / 1000.0);
    }
    if ms >= 1.0 {
        return format!("{ms:.2}ms");
    }
    format!("{:.0}us", ms * 1000.0)
}

pub(crate) fn format_ms_opt(ms: Option<f64>) -> String {
    ms.map(format_ms).unwrap_or_else(|| "-".to_string())
}

/// Single rounded component (`us`, `ms` or `s`) to keep progress lines short.
pub(crate) fn format_duration(d: Duration) -> String {
    let total_us = d.as_micros();
    if total_us >= 1_000_000 {
        return format!("{}s", (total_us + 500_000) / 1_000_000);
    }
    if total_us >= 1_000 {
        return format!("{}ms", (total_us + 500) / 1_000);
    }
    format!("{total_us}us")
}

pub(crate) fn format_pct(part: u64, total: u64) -> String {
    if total == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", part as f64 * 100.0 / total as f64)
}
