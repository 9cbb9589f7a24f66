pub mod error;
pub mod handlers;
pub mod state;
pub mod views;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub use error::ApiError;
pub use state::AppState;

/// Room for a logo plus a full gallery of images at the per-file cap.
const MAX_BODY_BYTES: usize = 24 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::builder_page))
        .route("/success", get(handlers::success_page))
        .route("/cancel", get(handlers::cancel_page))
        .route("/plans/:plan/locked", get(handlers::plan_locked_fields))
        .route("/preview", post(handlers::preview))
        .route("/checkout", post(handlers::create_checkout))
        .route("/verify-session", get(handlers::verify_session))
        .route("/download", get(handlers::download_site))
        .route("/webhook/stripe", post(handlers::stripe_webhook))
        .route("/ai-logo", post(handlers::ai_logo))
        .route("/lead", post(handlers::capture_lead))
        .route("/track", post(handlers::track_event))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
