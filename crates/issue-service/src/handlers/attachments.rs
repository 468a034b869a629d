use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse { pub upload_url: String }

/// Mint a pre-signed upload URL for a new attachment on the issue. The
/// attachment's public URL is recorded on the issue as a side effect.
#[utoipa::path(post, path = "/issues/{issue_id}/attachment", params( ("issue_id" = Uuid, Path, description = "Issue id") ), responses( (status = 201, body = UploadUrlResponse), (status = 404, body = crate::error::ApiErrorBody) ))]
#[tracing::instrument(level = "info", skip_all, fields(user = %identity.subject, issue_id = %issue_id))]
pub async fn create_upload_url(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<(StatusCode, Json<UploadUrlResponse>)> {
    let attachment_id = Uuid::new_v4();
    let upload_url = state
        .service
        .upload_url(issue_id, &identity.subject, attachment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(UploadUrlResponse { upload_url })))
}
