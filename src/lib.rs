pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::pdf_service::PdfService;
use crate::services::storage::ObjectStore;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Headroom on top of `max_file_size` for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::pdf::upload::upload_pdf,
        api::handlers::pdf::download::download_pdf,
        api::handlers::pdf::download::download_pdf_by_id,
        api::handlers::pdf::download::list_files,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::AuthRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::auth::MessageResponse,
            api::handlers::pdf::UploadResponse,
            api::handlers::pdf::UploadForm,
            api::handlers::health::HealthResponse,
            models::StoredFile,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "pdf", description = "PDF upload and download"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub pdf_service: Arc<PdfService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, store: Arc<dyn ObjectStore>, config: AppConfig) -> Self {
        let pdf_service = Arc::new(PdfService::new(store, &config));
        Self {
            db,
            pdf_service,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login));

    let pdf_routes = Router::new()
        .route(
            "/upload",
            post(api::handlers::pdf::upload_pdf).layer(DefaultBodyLimit::max(
                state.config.max_file_size + MULTIPART_OVERHEAD,
            )),
        )
        .route("/download/:filename", get(api::handlers::pdf::download_pdf))
        .route("/files", get(api::handlers::pdf::list_files))
        .route("/files/:id", get(api::handlers::pdf::download_pdf_by_id))
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/pdf", pdf_routes)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
