use std::time::{Duration, Instant};

use surge_http::{HttpClient, HttpRequest, HttpTransportErrorKind};

use super::check::Check;
use super::config::Target;
use super::stats::{HttpRequestMeta, RunStats};

/// What one iteration does: a single GET against the target, followed by its checks.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub target: Target,
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    pub status: Option<u16>,
    pub transport_error: Option<HttpTransportErrorKind>,
    pub elapsed: Duration,
    /// `(check name, passed)` in declaration order.
    pub checks: Vec<(String, bool)>,
}

impl IterationOutcome {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|(_, ok)| *ok)
    }
}

impl RequestPlan {
    /// The default plan: GET the target and check for `200`.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            checks: vec![Check::status_is(200)],
        }
    }

    /// Run one iteration. Never retries and never fails: transport errors become failed checks.
    pub async fn execute(&self, client: &HttpClient, stats: &RunStats) -> IterationOutcome {
        let req = HttpRequest::get(&self.target.url).with_timeout(self.target.timeout);

        let started = Instant::now();
        let result = client.request(req).await;
        let elapsed = started.elapsed();

        let (status, transport_error) = match &result {
            Ok(res) => {
                stats.record_http_request(HttpRequestMeta {
                    status: Some(res.status),
                    transport_error_kind: None,
                    elapsed,
                    bytes_received: res.bytes_received,
                    bytes_sent: res.bytes_sent,
                });
                (Some(res.status), None)
            }
            Err(err) => {
                let kind = err.transport_error_kind();
                tracing::debug!(url = %self.target.url, error = %err, "request failed");
                stats.record_http_request(HttpRequestMeta {
                    status: None,
                    transport_error_kind: Some(kind),
                    elapsed,
                    bytes_received: 0,
                    bytes_sent: 0,
                });
                (None, Some(kind))
            }
        };

        let checks = self
            .checks
            .iter()
            .map(|check| {
                let ok = check.evaluate(&result);
                stats.record_check(&stats.check_handle(&check.name), ok);
                (check.name.clone(), ok)
            })
            .collect();

        IterationOutcome {
            status,
            transport_error,
            elapsed,
            checks,
        }
    }
}
