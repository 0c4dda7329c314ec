//! Health check endpoint with component-level diagnostics.
//!
//! `GET /health` reports database and session store reachability, and
//! answers 503 when either is down.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::time::Instant;

use super::response::ApiResponse;
use super::state::AppState;

/// Health payload
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub session_store: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
        }
    }

    fn from_result<E: std::fmt::Display>(started: Instant, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::healthy(started.elapsed().as_millis() as u64),
            Err(e) => Self::unhealthy(e.to_string()),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthReport>>) {
    let started = Instant::now();
    let database = ComponentHealth::from_result(started, state.store.ping().await);

    let started = Instant::now();
    let session_store = ComponentHealth::from_result(started, state.chat.store().ping().await);

    let healthy = database.is_healthy() && session_store.is_healthy();
    let report = HealthReport {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            database,
            session_store,
        },
    };

    if healthy {
        (
            StatusCode::OK,
            Json(ApiResponse::success("Service is healthy.", report)),
        )
    } else {
        let mut body = ApiResponse::success("Service is unhealthy.", report);
        body.success = false;
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

/// Create health routes
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}
