pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::storage::StorageService;
use crate::services::upload::UploadService;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::refresh,
        api::handlers::auth::revoke,
        api::handlers::videos::create_video,
        api::handlers::videos::list_videos,
        api::handlers::videos::get_video,
        api::handlers::videos::delete_video,
        api::handlers::video_upload::upload_video,
        api::handlers::thumbnail_upload::upload_thumbnail,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::AuthRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::auth::RefreshResponse,
            api::handlers::videos::CreateVideoRequest,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "videos", description = "Video management and upload endpoints"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub uploads: Arc<UploadService>,
    pub config: Config,
}

pub fn create_app(state: AppState) -> Router {
    // Multipart framing adds a little on top of the file caps
    let video_body_limit = state.config.max_video_size + 10 * 1024 * 1024;
    let thumbnail_body_limit = state.config.max_thumbnail_size + 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login))
        .route("/refresh", post(api::handlers::auth::refresh))
        .route("/revoke", post(api::handlers::auth::revoke))
        .route(
            "/videos",
            post(api::handlers::videos::create_video)
                .get(api::handlers::videos::list_videos)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/videos/:id",
            get(api::handlers::videos::get_video)
                .delete(api::handlers::videos::delete_video)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/videos/:id/upload",
            post(api::handlers::video_upload::upload_video)
                .layer(axum::extract::DefaultBodyLimit::max(video_body_limit))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/videos/:id/thumbnail",
            post(api::handlers::thumbnail_upload::upload_thumbnail)
                .layer(axum::extract::DefaultBodyLimit::max(thumbnail_body_limit))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .nest_service("/assets", ServeDir::new(&state.config.assets_root))
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
