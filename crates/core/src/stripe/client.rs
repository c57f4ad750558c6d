use crate::stripe::error::StripeApiError;
use crate::stripe::{
    CheckoutSession, CheckoutSessionParams, PaymentGateway, PaymentIntent, PaymentIntentParams,
    PAYMENT_INTENT_PRODUCT, PRODUCT_DESCRIPTION,
};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(
            secret_key.starts_with("sk_"),
            "stripe secret key must start with sk_"
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self {
            http,
            secret_key: secret_key.to_string(),
            base_url: base_url.to_string(),
        })
    }

    pub fn from_secret_key(secret_key: &str) -> anyhow::Result<Self> {
        let base_url =
            std::env::var("STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(secret_key, &base_url, Duration::from_secs(timeout_secs))
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Idempotency-Key",
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())?,
        );
        Ok(headers)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .headers(self.headers()?)
            .form(form)
            .send()
            .await
            .context("stripe request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read stripe response body")?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<ErrorEnvelope>(&text).ok();
            let (message, code) = match parsed {
                Some(env) => (env.error.message, env.error.code),
                None => (None, None),
            };
            return Err(StripeApiError {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| format!("stripe returned HTTP {status}")),
                code,
            }
            .into());
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("failed to decode stripe response from {path}"))
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> anyhow::Result<CheckoutSession> {
        let form = checkout_session_form(&params, Utc::now());
        let session: CheckoutSession = self
            .post_form::<CheckoutSessionResponse>("/v1/checkout/sessions", &form)
            .await?
            .into();
        tracing::info!(session_id = %session.id, amount = params.unit_amount, "checkout session created");
        Ok(session)
    }

    async fn create_payment_intent(
        &self,
        params: PaymentIntentParams,
    ) -> anyhow::Result<PaymentIntent> {
        let form = payment_intent_form(&params);
        let intent: PaymentIntent = self
            .post_form::<PaymentIntentResponse>("/v1/payment_intents", &form)
            .await?
            .into();
        tracing::info!(payment_intent_id = %intent.id, amount = params.amount, "payment intent created");
        Ok(intent)
    }
}

pub fn checkout_session_form(
    params: &CheckoutSessionParams,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
    vec![
        pair("payment_method_types[0]", "card"),
        pair("line_items[0][price_data][currency]", &params.currency),
        pair(
            "line_items[0][price_data][product_data][name]",
            &params.product_name,
        ),
        pair(
            "line_items[0][price_data][product_data][description]",
            PRODUCT_DESCRIPTION,
        ),
        pair(
            "line_items[0][price_data][unit_amount]",
            &params.unit_amount.to_string(),
        ),
        pair("line_items[0][quantity]", "1"),
        pair("mode", "payment"),
        pair("success_url", &params.success_url),
        pair("cancel_url", &params.cancel_url),
        pair("metadata[product]", &params.product_name),
        pair(
            "metadata[timestamp]",
            &now.to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    ]
}

/// Caller metadata overrides the default `product` entry.
pub fn payment_intent_form(params: &PaymentIntentParams) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), params.amount.to_string()),
        ("currency".to_string(), params.currency.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];

    let mut metadata = std::collections::BTreeMap::new();
    metadata.insert("product".to_string(), PAYMENT_INTENT_PRODUCT.to_string());
    for (k, v) in &params.metadata {
        metadata.insert(k.clone(), v.clone());
    }
    for (k, v) in metadata {
        form.push((format!("metadata[{k}]"), v));
    }
    form
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl From<CheckoutSessionResponse> for CheckoutSession {
    fn from(r: CheckoutSessionResponse) -> Self {
        Self { id: r.id, url: r.url }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

impl From<PaymentIntentResponse> for PaymentIntent {
    fn from(r: PaymentIntentResponse) -> Self {
        Self {
            id: r.id,
            client_secret: r.client_secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}
