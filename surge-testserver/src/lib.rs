use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_RESTAURANTS: &str = "/api/v1/restaurants";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_SLOW: &str = "/slow";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub restaurants: String,
    pub slow: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            restaurants: format!("{base_url}{PATH_RESTAURANTS}"),
            slow: format!("{base_url}{PATH_SLOW}"),
            base_url,
        }
    }

    /// URL of an endpoint that always answers with `code`.
    pub fn status(&self, code: u16) -> String {
        format!("{}/status/{code}", self.base_url)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Restaurant {
    name: &'static str,
    location: Location,
    rating: f64,
    place_id: &'static str,
    view_count: u64,
    fav_count: u64,
}

async fn handle_restaurants(State(stats): State<TestServerStats>) -> Json<Vec<Restaurant>> {
    stats.inc_requests_total();
    Json(vec![
        Restaurant {
            name: "Restaurant 1",
            location: Location {
                lat: 25.0329694,
                lng: 121.5654177,
            },
            rating: 4.5,
            place_id: "asdjglsakjgka",
            view_count: 400,
            fav_count: 100,
        },
        Restaurant {
            name: "Restaurant 2",
            location: Location {
                lat: 25.0478,
                lng: 121.5170,
            },
            rating: 3.9,
            place_id: "qwpeoiruty",
            view_count: 12,
            fav_count: 3,
        },
    ])
}

async fn handle_status(
    State(stats): State<TestServerStats>,
    Path(code): Path<u16>,
) -> StatusCode {
    stats.inc_requests_total();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn handle_slow(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    sleep(Duration::from_millis(50)).await;
    "slow"
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_RESTAURANTS, get(handle_restaurants))
        .route(PATH_STATUS, get(handle_status))
        .route(PATH_SLOW, get(handle_slow))
        .with_state(stats)
}

/// In-process server on an ephemeral localhost port. Dropping it without
/// `shutdown` aborts the serving task.
pub struct TestServer {
    urls: TestServerUrls,
    stats: TestServerStats,
    shutdown: Option<(oneshot::Sender<()>, tokio::task::JoinHandle<()>)>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        Ok(Self {
            urls: TestServerUrls::new(format!("http://{addr}")),
            stats,
            shutdown: Some((tx, task)),
        })
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    /// Requests served so far, across all routes.
    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some((tx, task)) = self.shutdown.take() {
            let _ = tx.send(());
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some((_, task)) = self.shutdown.take() {
            task.abort();
        }
    }
}
