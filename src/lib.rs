use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod backend;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use handlers::AppState;

// Room for multipart framing around the largest accepted file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    let api = Router::new()
        .route("/auth/sign-up", post(handlers::auth::sign_up))
        .route("/auth/sign-in", post(handlers::auth::sign_in))
        .route("/auth/verify", post(handlers::auth::verify_otp))
        .route("/users/me", get(handlers::user::current_user))
        .route(
            "/files",
            get(handlers::files::list_files).post(handlers::files::upload_file),
        )
        .route("/files/:id", patch(handlers::files::rename_file));

    Router::new()
        .route("/health", get(handlers::health::liveness))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
