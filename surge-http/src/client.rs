use bytes::Bytes;
use http_body_util::{BodyExt as _, Empty};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use super::estimate::{estimate_http_request_bytes_parts, estimate_http1_response_head_bytes};
use super::util::{has_header, host_header_value, parse_http_url};
use super::{Error, HttpRequest, HttpResponse, Result};

const USER_AGENT: &str = concat!("surge/", env!("CARGO_PKG_VERSION"));

/// Pooled HTTP/1.1 client. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let inner = Client::builder(TokioExecutor::new()).build(connector);

        Self { inner }
    }
}

impl HttpClient {
    /// Send one request. The optional timeout covers both the response head and the body.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        match req.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.send(req)).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            },
            None => self.send(req).await,
        }
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let parsed = parse_http_url(&req.url)?;

        let mut headers = req.headers;
        if !has_header(&headers, "user-agent") {
            headers.push(("user-agent".to_string(), USER_AGENT.to_string()));
        }

        let bytes_sent = estimate_http_request_bytes_parts(&req.method, &req.url, &headers)?;

        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.clone()))?;

        let mut builder = Request::builder().method(req.method).uri(uri);

        // Make the implicit Host header explicit so byte accounting is deterministic.
        if !has_header(&headers, "host")
            && let Some(host) = host_header_value(&parsed)
        {
            builder = builder.header(http::header::HOST, host);
        }

        for (k, v) in &headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        let req: Request<Empty<Bytes>> = builder.body(Empty::new())?;
        let res: hyper::Response<Incoming> = self.inner.request(req).await?;

        let (parts, body) = res.into_parts();
        let status = parts.status.as_u16();
        let head_bytes =
            estimate_http1_response_head_bytes(parts.version, parts.status, &parts.headers);
        let headers = collect_headers(&parts.headers);
        let body = body.collect().await?.to_bytes();
        let bytes_received = head_bytes.saturating_add(body.len() as u64);

        Ok(HttpResponse {
            status,
            body,
            headers,
            bytes_sent,
            bytes_received,
        })
    }
}

fn collect_headers(map: &http::HeaderMap) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::with_capacity(map.keys_len());
    for (name, value) in map.iter() {
        let value = String::from_utf8_lossy(value.as_bytes());
        match out.iter_mut().find(|(k, _)| k == name.as_str()) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => out.push((name.as_str().to_string(), value.into_owned())),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let server = surge_testserver::TestServer::start()
            .await
            .unwrap_or_else(|e| panic!("start test server: {e}"));

        let client = HttpClient::default();
        let res = client
            .request(HttpRequest::get(&server.urls().restaurants))
            .await
            .unwrap_or_else(|e| panic!("request failed: {e}"));

        assert_eq!(res.status, 200);
        assert!(std::str::from_utf8(&res.body).is_ok_and(|b| b.contains("placeId")));
        assert!(
            res.headers
                .iter()
                .any(|(k, v)| k == "content-type" && v.starts_with("application/json"))
        );
        assert!(res.bytes_sent > 0);
        assert!(res.bytes_received > res.body.len() as u64);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn timeout_is_reported_as_timeout() {
        let server = surge_testserver::TestServer::start()
            .await
            .unwrap_or_else(|e| panic!("start test server: {e}"));

        let client = HttpClient::default();
        let req = HttpRequest::get(&server.urls().slow).with_timeout(Some(Duration::from_millis(5)));
        let err = match client.request(req).await {
            Ok(res) => panic!("expected timeout, got status {}", res.status),
            Err(err) => err,
        };

        assert!(matches!(err, Error::Timeout(_)));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn refused_connection_is_a_request_error() {
        // Bind and immediately drop a listener to get a port with nothing behind it.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")
                .unwrap_or_else(|e| panic!("bind: {e}"));
            listener
                .local_addr()
                .unwrap_or_else(|e| panic!("local_addr: {e}"))
        };

        let client = HttpClient::default();
        let err = match client.request(HttpRequest::get(&format!("http://{addr}/"))).await {
            Ok(res) => panic!("expected connect error, got status {}", res.status),
            Err(err) => err,
        };

        assert_eq!(
            err.transport_error_kind(),
            crate::HttpTransportErrorKind::Request
        );
    }
}
