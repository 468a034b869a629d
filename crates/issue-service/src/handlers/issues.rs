use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateIssueRequest, Issue, IssuePatch};
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct IssueListResponse { pub items: Vec<Issue> }

#[derive(Serialize, ToSchema)]
pub struct IssueResponse { pub item: Issue }

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilterRequest { pub user_type: String }

/// List every issue visible to the caller (reported or assigned).
#[utoipa::path(get, path = "/issues", responses( (status = 200, body = IssueListResponse), (status = 401, body = crate::error::ApiErrorBody) ))]
pub async fn list_issues(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<IssueListResponse>> {
    let items = state.service.get_all(&identity.subject).await?;
    Ok(Json(IssueListResponse { items }))
}

/// Filtered listing by the caller's role on the issue.
#[utoipa::path(post, path = "/issues", request_body = IssueFilterRequest, responses( (status = 200, body = IssueListResponse), (status = 400, body = crate::error::ApiErrorBody) ))]
pub async fn list_issues_by_filter(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<IssueFilterRequest>,
) -> ApiResult<Json<IssueListResponse>> {
    let items = match req.user_type.as_str() {
        "reporter" => state.service.get_all_reported(&identity.subject).await?,
        "assignee" => state.service.get_all_assigned(&identity.subject).await?,
        other => return Err(ApiError::bad_request(format!("invalid userType: {other}"))),
    };
    Ok(Json(IssueListResponse { items }))
}

/// Create an issue. Reporter, status and creation time are server-assigned.
#[utoipa::path(post, path = "/issues/new", request_body = CreateIssueRequest, responses( (status = 201, body = IssueResponse), (status = 401, body = crate::error::ApiErrorBody) ))]
#[tracing::instrument(level = "info", skip_all, fields(user = %identity.subject))]
pub async fn create_issue(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateIssueRequest>,
) -> ApiResult<(StatusCode, Json<IssueResponse>)> {
    let item = state.service.create(req, &identity.subject).await?;
    tracing::info!(issue_id = %item.issue_id, "issue created");
    Ok((StatusCode::CREATED, Json(IssueResponse { item })))
}

/// Partial update; omitted fields keep their stored values.
#[utoipa::path(patch, path = "/issues/{issue_id}", request_body = IssuePatch, params( ("issue_id" = Uuid, Path, description = "Issue id") ), responses( (status = 204), (status = 404, body = crate::error::ApiErrorBody) ))]
#[tracing::instrument(level = "info", skip_all, fields(user = %identity.subject, issue_id = %issue_id))]
pub async fn update_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(patch): Json<IssuePatch>,
) -> ApiResult<StatusCode> {
    state.service.update(issue_id, &identity.subject, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an issue; only its reporter may do this.
#[utoipa::path(delete, path = "/issues/{issue_id}", params( ("issue_id" = Uuid, Path, description = "Issue id") ), responses( (status = 204), (status = 404, body = crate::error::ApiErrorBody) ))]
#[tracing::instrument(level = "info", skip_all, fields(user = %identity.subject, issue_id = %issue_id))]
pub async fn delete_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let removed = state.service.delete(issue_id, &identity.subject).await?;
    tracing::info!(issue_id = %removed.issue_id, "issue deleted");
    Ok(StatusCode::NO_CONTENT)
}
