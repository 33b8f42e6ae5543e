//! Health check endpoints
//!
//! - /health, /healthz - Liveness probe (is the service running?)
//! - /version - Build version

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::responses::{json_response, FullBody};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub timestamp: String,
    /// "development" or "production"
    pub mode: &'static str,
    /// Backing store for exchanges ("mongodb" or "memory")
    pub store: &'static str,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        store: state.exchanges.backend(),
    }
}

/// GET /health - Liveness probe
pub fn health_check(state: Arc<AppState>) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(&state))
}

/// GET /version
pub fn version_info() -> Response<FullBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
