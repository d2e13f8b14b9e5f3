pub mod auth;
pub mod error;
pub mod payments;
mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/send-otp", post(auth::send_otp))
        // Requires a Bearer token (AuthUser extractor)
        .route("/verify-otp", post(auth::verify_otp))
        .route("/update-password", post(auth::update_password));

    let payment_routes = Router::new()
        // Requires a Bearer token (AuthUser extractor)
        .route("/initiate", post(payments::initiate_payment))
        .route("/callback", get(payments::payment_callback))
        // Authenticated by webhook signature, not a session
        .route("/webhook", post(payments::paystack_webhook));

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/paystack", payment_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
