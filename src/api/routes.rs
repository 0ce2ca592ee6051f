use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Headroom for multipart boundaries and the password field on top of the
/// file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize + MULTIPART_OVERHEAD;

    Router::new()
        // Own files
        .route("/", get(handlers::list_files))
        .route("/files", get(handlers::list_files))
        .route("/files/sort/:criteria", get(handlers::sort_files))
        .route("/files/search", get(handlers::search_files))
        .route("/files/page/:page", get(handlers::page_files))
        .route("/files/share/:file_id", get(handlers::share_file))
        .route(
            "/files/download/:file_id",
            get(handlers::download_file).post(handlers::download_file_with_password),
        )
        .route("/files/delete/:file_id", post(handlers::delete_file))
        .route("/files/preview/:file_id", get(handlers::preview_file))
        // Upload and raw download
        .route(
            "/upload",
            get(handlers::upload_form)
                .post(handlers::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/uploads/:filename", get(handlers::serve_upload))
        // Accounts
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        // Admin console
        .route("/admin/dashboard", get(handlers::dashboard))
        .route("/admin/activity", get(handlers::activity))
        .route("/admin/delete_user/:user_id", post(handlers::delete_user))
        .route(
            "/admin/delete_file/:file_id",
            post(handlers::delete_file_admin),
        )
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
