pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod storage;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    middleware,
    response::Html,
    routing::{get, patch, post},
    Router,
};
use utoipa::OpenApi;

use auth::TokenVerifier;
use handlers::{
    attachments::create_upload_url,
    health::{health, readiness},
    issues::{create_issue, delete_issue, list_issues, list_issues_by_filter, update_issue},
};
use services::issues::IssueService;
use telemetry::metrics_handler;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IssueService>,
    pub verifier: Arc<dyn TokenVerifier>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::health::readiness,
        handlers::issues::list_issues,
        handlers::issues::list_issues_by_filter,
        handlers::issues::create_issue,
        handlers::issues::update_issue,
        handlers::issues::delete_issue,
        handlers::attachments::create_upload_url,
    ),
    components(schemas(
        models::Issue,
        models::IssueStatus,
        models::CreateIssueRequest,
        models::IssuePatch,
        handlers::issues::IssueListResponse,
        handlers::issues::IssueResponse,
        handlers::issues::IssueFilterRequest,
        handlers::attachments::UploadUrlResponse,
        handlers::health::HealthResponse,
        error::ApiErrorBody,
    )),
    tags( (name = "issues", description = "Issue Tracking API") )
)]
pub struct ApiDoc;

async fn swagger_ui() -> Html<String> {
    let html = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"/><title>Issue Service API Docs</title>
<link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
window.onload = () => { SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' }); };
</script>
</body></html>"#;
    Html(html.to_string())
}

pub fn build_router(state: AppState) -> Router {
    let mut openapi = ApiDoc::openapi();
    // Inject security scheme manually (workaround for macro limitations)
    if let Ok(mut value) = serde_json::to_value(&openapi) {
        use serde_json::json;
        value["components"]["securitySchemes"]["bearer_auth"] =
            json!({"type":"http","scheme":"bearer"});
        value["security"] = json!([{"bearer_auth": []}]);
        if let Ok(spec) = serde_json::from_value(value.clone()) {
            openapi = spec;
        }
    }
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readiness))
        .route("/metrics", get(metrics_handler))
        .route("/issues", get(list_issues).post(list_issues_by_filter))
        .route("/issues/new", post(create_issue))
        .route("/issues/:issue_id", patch(update_issue).delete(delete_issue))
        .route("/issues/:issue_id/attachment", post(create_upload_url))
        .route("/openapi.json", get(|| async move { axum::Json(openapi.clone()) }))
        .route("/swagger", get(swagger_ui))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .with_state(state)
}
