use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

mod chat;
mod diagnostics;
mod stripe;

#[cfg(test)]
pub(crate) mod test_support;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/stripe/create-checkout-session",
            post(stripe::create_checkout_session).get(stripe::checkout_session_wrong_method),
        )
        .route(
            "/api/stripe/create-payment-intent",
            post(stripe::create_payment_intent).get(stripe::payment_intent_wrong_method),
        )
        .route(
            "/api/stripe/webhook",
            post(stripe::webhook).get(stripe::webhook_wrong_method),
        )
        .route("/api/stripe/config", get(diagnostics::stripe_config))
        .route("/api/auth/config", get(diagnostics::auth_config))
        .route("/api/debug/env", get(diagnostics::debug_env))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}
