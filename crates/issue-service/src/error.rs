use axum::{response::{IntoResponse, Response}, Json, http::StatusCode};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use std::fmt::{Display, Formatter};

/// Failure surface of the record store and attachment adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The issue does not exist, or the caller is neither reporter nor
    /// assignee (for deletes: not the reporter). The two causes are
    /// deliberately indistinguishable to the caller.
    #[error("issue not found or access denied")]
    Denied,
    #[error("issue already exists")]
    AlreadyExists,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiErrorBody { pub code: &'static str, pub message: String }

#[derive(Debug, Clone)]
pub struct ApiError { pub status: StatusCode, pub code: &'static str, pub message: String }

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, "bad_request", msg) }
    pub fn unauthorized(msg: impl Into<String>) -> Self { Self::new(StatusCode::UNAUTHORIZED, "unauthorized", msg) }
    pub fn not_found(msg: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, "not_found", msg) }
    pub fn conflict(msg: impl Into<String>) -> Self { Self::new(StatusCode::CONFLICT, "conflict", msg) }
    pub fn internal(msg: impl Into<String>) -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", msg) }
    pub fn service_unavailable() -> Self { Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", "Required dependency not ready") }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}: {}", self.code, self.message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody { code: self.code, message: self.message };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Denied => ApiError::not_found("issue not found or access denied"),
            StoreError::AlreadyExists => ApiError::conflict("issue already exists"),
            StoreError::Unavailable(msg) => ApiError::internal(format!("store failure: {msg}")),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
