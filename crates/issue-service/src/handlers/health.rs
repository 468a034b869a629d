use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse { pub status: &'static str }

/// Health check endpoint
#[utoipa::path(get, path = "/health", responses( (status = 200, body = HealthResponse) ))]
pub async fn health() -> Json<HealthResponse> { Json(HealthResponse { status: "ok" }) }

/// Readiness: verifies the backing store answers.
#[utoipa::path(get, path = "/readyz", responses( (status = 200, body = HealthResponse), (status = 503, body = crate::error::ApiErrorBody) ))]
pub async fn readiness(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.service.ping().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness_store_ping_failed");
        ApiError::service_unavailable()
    })?;
    Ok(Json(HealthResponse { status: "ready" }))
}
