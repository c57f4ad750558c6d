use crate::error::{parse_json, ApiError};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use omniplex_core::stripe::webhook::{self, WebhookEventKind, SIGNATURE_HEADER};
use omniplex_core::stripe::{
    round_amount, CheckoutSessionParams, PaymentGateway, PaymentIntentParams, DEFAULT_AMOUNT_CENTS,
    DEFAULT_CURRENCY, DEFAULT_PRODUCT_NAME, MIN_AMOUNT_CENTS,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const NOT_CONFIGURED: &str =
    "Stripe is not properly configured. Please check your environment variables.";

fn gateway(state: &AppState) -> Result<&Arc<dyn PaymentGateway>, ApiError> {
    state.payments.as_ref().ok_or_else(|| {
        tracing::warn!("payment request rejected: stripe not configured");
        ApiError::internal(NOT_CONFIGURED)
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutRequest {
    price_amount: Option<f64>,
    currency: Option<String>,
    product_name: Option<String>,
    success_url: Option<String>,
    cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutResponse {
    session_id: String,
    url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl CheckoutRequest {
    fn into_params(self, origin: &str) -> CheckoutSessionParams {
        CheckoutSessionParams {
            unit_amount: round_amount(self.price_amount.unwrap_or(DEFAULT_AMOUNT_CENTS as f64)),
            currency: non_empty(self.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            product_name: non_empty(self.product_name)
                .unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()),
            success_url: non_empty(self.success_url)
                .unwrap_or_else(|| format!("{origin}/payment-success")),
            cancel_url: non_empty(self.cancel_url)
                .unwrap_or_else(|| format!("{origin}/payment-cancel")),
        }
    }
}

fn request_origin(headers: &HeaderMap) -> String {
    headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ORIGIN)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let gateway = gateway(&state)?;
    let req: CheckoutRequest = parse_json(&body)?;
    let params = req.into_params(&request_origin(&headers));

    let session = gateway
        .create_checkout_session(params)
        .await
        .map_err(|e| ApiError::vendor(e, "stripe checkout session creation"))?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

pub(crate) async fn checkout_session_wrong_method() -> ApiError {
    ApiError::method_not_allowed("Method not allowed. Use POST to create checkout session.")
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PaymentIntentRequest {
    amount: Option<f64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentIntentResponse {
    client_secret: Option<String>,
    payment_intent_id: String,
}

/// Stripe metadata values are strings; other JSON scalars keep their textual form.
fn metadata_strings(metadata: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    metadata
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect()
}

pub(crate) async fn create_payment_intent(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let gateway = gateway(&state)?;
    let req: PaymentIntentRequest = parse_json(&body)?;

    let amount = req.amount.unwrap_or(DEFAULT_AMOUNT_CENTS as f64);
    if amount < MIN_AMOUNT_CENTS as f64 {
        return Err(ApiError::bad_request("Amount must be at least $0.50"));
    }

    let params = PaymentIntentParams {
        amount: round_amount(amount),
        currency: non_empty(req.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        metadata: metadata_strings(req.metadata),
    };

    let intent = gateway
        .create_payment_intent(params)
        .await
        .map_err(|e| ApiError::vendor(e, "stripe payment intent creation"))?;

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}

pub(crate) async fn payment_intent_wrong_method() -> ApiError {
    ApiError::method_not_allowed("Method not allowed. Use POST to create payment intent.")
}

pub(crate) async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if state.payments.is_none() {
        return Err(ApiError::internal("Stripe is not properly configured"));
    }

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return Err(ApiError::bad_request("Missing stripe signature"));
    };

    let secret = state.webhook_secret.as_deref().unwrap_or_default();
    let event = webhook::construct_event(&body, signature, secret, chrono::Utc::now()).map_err(
        |e| {
            tracing::error!(error = %e, "webhook signature verification failed");
            ApiError::bad_request("Webhook signature verification failed")
        },
    )?;

    let object_id = event.object_id().unwrap_or("unknown");
    match event.kind() {
        WebhookEventKind::PaymentIntentSucceeded => {
            tracing::info!(event_id = %event.id, payment_intent_id = object_id, "payment succeeded");
        }
        WebhookEventKind::PaymentIntentFailed => {
            tracing::warn!(event_id = %event.id, payment_intent_id = object_id, "payment failed");
        }
        WebhookEventKind::CheckoutSessionCompleted => {
            tracing::info!(event_id = %event.id, session_id = object_id, "checkout session completed");
        }
        WebhookEventKind::Other(event_type) => {
            tracing::info!(event_id = %event.id, %event_type, "unhandled webhook event type");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

pub(crate) async fn webhook_wrong_method() -> ApiError {
    ApiError::method_not_allowed("Method not allowed. Use POST for webhooks.")
}
