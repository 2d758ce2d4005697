use std::borrow::Cow;

use super::util::{has_header, host_header_value, parse_http_url};
use super::Result;

/// Best-effort size of the HTTP/1.1 request head: request line, headers, blank line.
/// Host is counted even when the caller leaves it implicit.
pub(super) fn estimate_http_request_bytes_parts(
    method: &http::Method,
    url: &str,
    headers: &[(String, String)],
) -> Result<u64> {
    let parsed = parse_http_url(url)?;

    let mut bytes = 0u64;
    bytes = bytes.saturating_add(estimate_http1_request_line_bytes(method, &parsed));

    for (k, v) in headers {
        bytes = bytes.saturating_add(estimate_http1_header_bytes(k.as_bytes(), v.as_bytes()));
    }

    if !has_header(headers, "host")
        && let Some(host) = host_header_value(&parsed)
    {
        bytes = bytes.saturating_add(estimate_http1_header_bytes(b"host", host.as_bytes()));
    }

    // End of headers.
    Ok(bytes.saturating_add(2))
}

fn estimate_http1_request_line_bytes(method: &http::Method, parsed: &url::Url) -> u64 {
    let method_len = method.as_str().len() as u64;
    let path_len = parsed.path().len() as u64
        + parsed
            .query()
            .map(|q| (q.len() as u64).saturating_add(1))
            .unwrap_or(0);
    let version_len = "HTTP/1.1".len() as u64;

    // "METHOD SP path SP HTTP/1.1 CRLF"
    method_len
        .saturating_add(1)
        .saturating_add(path_len)
        .saturating_add(1)
        .saturating_add(version_len)
        .saturating_add(2)
}

pub(super) fn estimate_http1_response_head_bytes(
    version: http::Version,
    status: http::StatusCode,
    headers: &http::HeaderMap,
) -> u64 {
    let mut bytes = 0u64;
    bytes = bytes.saturating_add(estimate_http1_status_line_bytes(version, status));
    for (name, value) in headers.iter() {
        bytes = bytes.saturating_add(estimate_http1_header_bytes(
            name.as_str().as_bytes(),
            value.as_bytes(),
        ));
    }
    bytes.saturating_add(2)
}

fn estimate_http1_status_line_bytes(version: http::Version, status: http::StatusCode) -> u64 {
    let version_str: Cow<'static, str> = match version {
        http::Version::HTTP_10 => Cow::Borrowed("HTTP/1.0"),
        http::Version::HTTP_2 => Cow::Borrowed("HTTP/2"),
        _ => Cow::Borrowed("HTTP/1.1"),
    };

    // "HTTP/1.1 SP 200 CRLF" (reason-phrase ignored)
    (version_str.len() as u64)
        .saturating_add(1)
        .saturating_add(status.as_str().len() as u64)
        .saturating_add(2)
}

fn estimate_http1_header_bytes(name: &[u8], value: &[u8]) -> u64 {
    // "name: value\r\n"
    (name.len() as u64)
        .saturating_add(2)
        .saturating_add(value.len() as u64)
        .saturating_add(2)
}
