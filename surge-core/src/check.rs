use surge_http::HttpResponse;

/// A named assertion evaluated once per iteration against the request result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub expected_status: u16,
}

impl Check {
    /// `"is status <code>"`, passing only when the response status equals `code`.
    pub fn status_is(code: u16) -> Self {
        Self {
            name: format!("is status {code}"),
            expected_status: code,
        }
    }

    /// Transport errors and unexpected statuses both evaluate to `false`.
    pub fn evaluate(&self, result: &surge_http::Result<HttpResponse>) -> bool {
        match result {
            Ok(res) => res.status == self.expected_status,
            Err(_) => false,
        }
    }
}
