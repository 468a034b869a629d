//! Binary entrypoint for the issue tracking service.
use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use issue_service::auth::StaticTokenVerifier;
use issue_service::config::{Config, StoreMode};
use issue_service::db::init_db;
use issue_service::services::issues::IssueService;
use issue_service::storage::StorageManager;
use issue_service::store::{IssueStore, MemoryIssueStore, PgIssueStore};
use issue_service::telemetry::{normalize_path, HTTP_REQUESTS, HTTP_REQUEST_DURATION};
use issue_service::{build_router, AppState};
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn IssueStore> = match config.store_mode {
        StoreMode::Postgres => {
            let pool = init_db(&config.database_url).await?;
            Arc::new(PgIssueStore::new(pool))
        }
        StoreMode::Memory => {
            warn!("using in-memory issue store, records will not survive a restart");
            Arc::new(MemoryIssueStore::default())
        }
    };
    let storage = StorageManager::from_config(&config).await;
    let service = Arc::new(IssueService::new(store, storage, config.url_expiration));
    if config.api_tokens.is_empty() {
        warn!("ISSUES_API_TOKENS is empty, every /issues request will be rejected");
    }
    let verifier = Arc::new(StaticTokenVerifier::new(config.api_tokens.clone()));
    let state = AppState { service, verifier };

    async fn track_metrics(mut req: Request<Body>, next: Next) -> Response {
        let method = req.method().clone();
        let path_label = normalize_path(req.uri().path());
        let req_id = Uuid::new_v4();
        req.extensions_mut().insert(req_id);
        let start = std::time::Instant::now();
        let mut resp = next.run(req).await;
        let status = resp.status().as_u16().to_string();
        HTTP_REQUESTS
            .with_label_values(&[method.as_str(), path_label.as_str(), status.as_str()])
            .inc();
        HTTP_REQUEST_DURATION
            .with_label_values(&[method.as_str(), path_label.as_str()])
            .observe(start.elapsed().as_secs_f64());
        if let Ok(value) = HeaderValue::from_str(&req_id.to_string()) {
            resp.headers_mut().insert("x-request-id", value);
        }
        resp
    }

    const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB
    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(track_metrics));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "issue-service listening");
    let shutdown = async {
        tokio::signal::ctrl_c().await.expect("install ctrl_c");
        info!(target: "shutdown.signal", "received Ctrl+C");
        tokio::time::sleep(Duration::from_millis(200)).await; // graceful drain window
    };
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
