use hdrhistogram::Histogram;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use surge_http::HttpTransportErrorKind;

#[derive(Debug, Default)]
struct CheckCounters {
    total: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct CheckHandle {
    counters: Arc<CheckCounters>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub total: u64,
    pub failed: u64,
}

impl CheckSummary {
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HttpRequestMeta {
    pub status: Option<u16>,
    /// If set, the request failed due to a transport error.
    pub transport_error_kind: Option<HttpTransportErrorKind>,
    pub elapsed: Duration,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

/// Latency summary in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
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

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scenario: String,
    pub requests_total: u64,
    pub failed_requests_total: u64,
    pub iterations_total: u64,
    pub dropped_iterations_total: u64,
    pub interrupted_iterations_total: u64,
    pub checks_total: u64,
    pub checks_failed: u64,
    pub checks_by_name: Vec<CheckSummary>,
    /// Failed requests keyed by `http_status:<code>` or `http_error:<kind>`.
    pub errors: BTreeMap<String, u64>,
    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,
    pub run_duration: Duration,
    pub rps: f64,
    pub req_per_sec_avg: f64,
    pub req_per_sec_stdev: f64,
    pub req_per_sec_max: f64,
    pub req_per_sec_stdev_pct: f64,
    pub latency: Option<LatencySummary>,
}

impl RunSummary {
    pub fn checks_passed(&self) -> bool {
        self.checks_failed == 0
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RpsAgg {
    count: u64,
    mean: f64,
    m2: f64,
    max: f64,
}

impl RpsAgg {
    fn record(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }

        // Welford's online mean/variance.
        self.count = self.count.saturating_add(1);
        let delta = sample - self.mean;
        self.mean += delta / (self.count as f64);
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
        self.max = self.max.max(sample);
    }

    fn summary(&self) -> (f64, f64, f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let avg = self.mean;
        let stdev = if self.count >= 2 {
            (self.m2 / ((self.count - 1) as f64)).sqrt()
        } else {
            0.0
        };

        let stdev_pct = if avg > 0.0 {
            (stdev / avg) * 100.0
        } else {
            0.0
        };
        (avg, stdev, self.max, stdev_pct)
    }
}

#[derive(Debug)]
pub struct RunStats {
    requests_total: AtomicU64,
    failed_requests_total: AtomicU64,
    iterations_total: AtomicU64,
    dropped_iterations_total: AtomicU64,
    interrupted_iterations_total: AtomicU64,
    checks_total: AtomicU64,
    checks_failed: AtomicU64,
    checks_by_name: Mutex<HashMap<Arc<str>, Arc<CheckCounters>>>,
    errors: Mutex<HashMap<String, u64>>,
    bytes_received_total: AtomicU64,
    bytes_sent_total: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
    latency_us_window: Mutex<Histogram<u64>>,

    rps_samples: Mutex<RpsAgg>,
}

impl Default for RunStats {
    fn default() -> Self {
        fn new_hist() -> Histogram<u64> {
            // Track up to 60s in microseconds (with 3 sigfigs).
            Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)
                .unwrap_or_else(|err| panic!("failed to init histogram: {err}"))
        }

        Self {
            requests_total: AtomicU64::new(0),
            failed_requests_total: AtomicU64::new(0),
            iterations_total: AtomicU64::new(0),
            dropped_iterations_total: AtomicU64::new(0),
            interrupted_iterations_total: AtomicU64::new(0),
            checks_total: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
            checks_by_name: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            bytes_received_total: AtomicU64::new(0),
            bytes_sent_total: AtomicU64::new(0),
            latency_us: Mutex::new(new_hist()),
            latency_us_window: Mutex::new(new_hist()),

            rps_samples: Mutex::new(RpsAgg::default()),
        }
    }
}

impl RunStats {
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_requests_total(&self) -> u64 {
        self.failed_requests_total.load(Ordering::Relaxed)
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations_total.load(Ordering::Relaxed)
    }

    pub fn dropped_iterations_total(&self) -> u64 {
        self.dropped_iterations_total.load(Ordering::Relaxed)
    }

    pub fn bytes_received_total(&self) -> u64 {
        self.bytes_received_total.load(Ordering::Relaxed)
    }

    pub fn bytes_sent_total(&self) -> u64 {
        self.bytes_sent_total.load(Ordering::Relaxed)
    }

    pub fn checks_total(&self) -> u64 {
        self.checks_total.load(Ordering::Relaxed)
    }

    pub fn checks_failed_total(&self) -> u64 {
        self.checks_failed.load(Ordering::Relaxed)
    }

    pub fn req_per_sec_summary(&self) -> (f64, f64, f64, f64) {
        let agg = self
            .rps_samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        agg.summary()
    }

    pub fn errors_snapshot(&self) -> HashMap<String, u64> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn record_iteration(&self) {
        self.iterations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_iterations(&self, n: u64) {
        if n != 0 {
            self.dropped_iterations_total
                .fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_interrupted_iterations(&self, n: u64) {
        if n != 0 {
            self.interrupted_iterations_total
                .fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_rps_sample(&self, rps_now: f64) {
        let mut agg = self
            .rps_samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        agg.record(rps_now);
    }

    pub fn record_http_request(&self, req: HttpRequestMeta) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let error_key = match (req.transport_error_kind, req.status) {
            (Some(kind), _) => Some(format!("http_error:{kind}")),
            (None, Some(status)) if status >= 400 => Some(format!("http_status:{status}")),
            _ => None,
        };

        if let Some(key) = error_key {
            self.failed_requests_total.fetch_add(1, Ordering::Relaxed);
            let mut errors = self
                .errors
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *errors.entry(key).or_insert(0) += 1;
        }

        // Transport failures never produced a response; keep them out of the latency series.
        if req.transport_error_kind.is_none() {
            self.record_latency(req.elapsed);
        }

        if req.bytes_received != 0 {
            self.bytes_received_total
                .fetch_add(req.bytes_received, Ordering::Relaxed);
        }

        if req.bytes_sent != 0 {
            self.bytes_sent_total
                .fetch_add(req.bytes_sent, Ordering::Relaxed);
        }
    }

    pub fn check_handle(&self, name: &str) -> CheckHandle {
        let counters = {
            let mut map = self
                .checks_by_name
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(Arc::from(name))
                .or_insert_with(|| Arc::new(CheckCounters::default()))
                .clone()
        };

        CheckHandle { counters }
    }

    pub fn record_check(&self, handle: &CheckHandle, ok: bool) {
        self.checks_total.fetch_add(1, Ordering::Relaxed);
        handle.counters.total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.checks_failed.fetch_add(1, Ordering::Relaxed);
            handle.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_latency(&self, elapsed: Duration) {
        let value = (elapsed.as_micros() as u64).max(1);

        {
            let mut h = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            h.saturating_record(value);
        }

        {
            let mut h = self
                .latency_us_window
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            h.saturating_record(value);
        }
    }

    /// p50/p90/p95/p99 (ms) since the previous call; resets the window.
    pub fn take_latency_window_ms(&self) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
        let mut h = self
            .latency_us_window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let out = if h.is_empty() {
            (None, None, None, None)
        } else {
            (
                Some(h.value_at_quantile(0.50) as f64 / 1000.0),
                Some(h.value_at_quantile(0.90) as f64 / 1000.0),
                Some(h.value_at_quantile(0.95) as f64 / 1000.0),
                Some(h.value_at_quantile(0.99) as f64 / 1000.0),
            )
        };

        h.reset();
        out
    }

    pub fn latency_summary(&self) -> Option<LatencySummary> {
        let h = self
            .latency_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if h.is_empty() {
            return None;
        }

        let ms = |us: u64| us as f64 / 1000.0;
        Some(LatencySummary {
            p50: ms(h.value_at_quantile(0.50)),
            p75: ms(h.value_at_quantile(0.75)),
            p90: ms(h.value_at_quantile(0.90)),
            p95: ms(h.value_at_quantile(0.95)),
            p99: ms(h.value_at_quantile(0.99)),
            min: ms(h.min()),
            max: ms(h.max()),
            mean: h.mean() / 1000.0,
            stdev: h.stdev() / 1000.0,
            count: h.len(),
        })
    }

    pub fn summarize(&self, scenario: &str, elapsed: Duration) -> RunSummary {
        let secs = elapsed.as_secs_f64().max(1e-9);
        let requests_total = self.requests_total();

        let checks_by_name = {
            let map = self
                .checks_by_name
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut out: Vec<CheckSummary> = map
                .iter()
                .map(|(name, counters)| CheckSummary {
                    name: name.to_string(),
                    total: counters.total.load(Ordering::Relaxed),
                    failed: counters.failed.load(Ordering::Relaxed),
                })
                .collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            out
        };

        let (req_per_sec_avg, req_per_sec_stdev, req_per_sec_max, req_per_sec_stdev_pct) =
            self.req_per_sec_summary();

        RunSummary {
            scenario: scenario.to_string(),
            requests_total,
            failed_requests_total: self.failed_requests_total(),
            iterations_total: self.iterations_total(),
            dropped_iterations_total: self.dropped_iterations_total(),
            interrupted_iterations_total: self
                .interrupted_iterations_total
                .load(Ordering::Relaxed),
            checks_total: self.checks_total(),
            checks_failed: self.checks_failed_total(),
            checks_by_name,
            errors: self.errors_snapshot().into_iter().collect(),
            bytes_received_total: self.bytes_received_total(),
            bytes_sent_total: self.bytes_sent_total(),
            run_duration: elapsed,
            rps: (requests_total as f64) / secs,
            req_per_sec_avg,
            req_per_sec_stdev,
            req_per_sec_max,
            req_per_sec_stdev_pct,
            latency: self.latency_summary(),
        }
    }
}
