use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use warp::Filter;

pub const SERVICE_NAME: &str = "eBay Listing Watcher";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub role: String,
}

/// Liveness for the web role. The worker exposes no port, so this only reports
/// that the process answering the request is up.
#[derive(Clone)]
pub struct HealthChecker {
    start_time: Instant,
    role: String,
}

impl HealthChecker {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            role: role.into(),
        }
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            status: "running".to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }

    pub fn get_status(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            role: self.role.clone(),
        }
    }
}

/// `GET /` and `GET /health`.
pub fn routes(
    checker: Arc<HealthChecker>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let info_checker = checker.clone();
    let root = warp::path::end()
        .and(warp::get())
        .map(move || warp::reply::json(&info_checker.service_info()));

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || warp::reply::json(&checker.get_status()));

    root.or(health)
}

pub async fn start_health_server(checker: Arc<HealthChecker>, port: u16) {
    tracing::info!("✅ Health endpoint running on port {}", port);
    warp::serve(routes(checker)).run(([0, 0, 0, 0], port)).await;
}
