/// Health check endpoint
///
/// Reports that the server is up and whether the store answers a ping.
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/healthcheck
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": 200,
///   "message": "Server is running",
///   "data": { "status": "healthy", "version": "0.1.0", "database": "connected" },
///   "success": true
/// }
/// ```

use crate::{app::AppState, response::ApiResponse};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health check payload
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    /// Application version
    pub version: String,

    /// `connected` or `unavailable`
    pub database: String,
}

/// Health check handler
///
/// Always 200; a failed ping only downgrades the reported status.
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    let connected = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Store ping failed");
            false
        }
    };

    let health = HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "unavailable" }.to_string(),
    };

    ApiResponse::ok(health, "Server is running")
}
