pub mod api;
pub mod client;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ServerConfig;
use crate::services::fault::{FailureInjector, NoFailures, RandomFailures};
use crate::services::store::{FileStore, InMemoryFileStore};
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload_file,
        api::handlers::files::list_files,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::StoredFile,
            models::UploadResponse,
            models::FileListResponse,
            models::ErrorResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "files", description = "Idempotent upload endpoints"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub upload_service: Arc<UploadService>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn FileStore>,
        failures: Arc<dyn FailureInjector>,
        config: ServerConfig,
    ) -> Self {
        let upload_service = Arc::new(UploadService::new(store, failures, config.clone()));
        Self {
            upload_service,
            config,
        }
    }

    /// In-memory store, failure injection driven by `config.failure_rate`.
    pub fn from_config(config: ServerConfig) -> Self {
        let failures: Arc<dyn FailureInjector> = if config.failure_rate > 0.0 {
            Arc::new(RandomFailures::new(config.failure_rate))
        } else {
            Arc::new(NoFailures)
        };
        Self::new(Arc::new(InMemoryFileStore::new()), failures, config)
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/upload",
            post(api::handlers::files::upload_file).get(api::handlers::files::list_files),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + 10 * 1024 * 1024, // Add 10MB buffer for multipart overhead
        ))
        .with_state(state)
}
