use serde::Serialize;
use std::collections::BTreeMap;

pub mod client;
pub mod error;
pub mod keys;
pub mod webhook;

pub const DEFAULT_PRODUCT_NAME: &str = "Omniplex Pro Plan";
pub const PRODUCT_DESCRIPTION: &str = "Unlock advanced features with Omniplex Pro";
pub const PAYMENT_INTENT_PRODUCT: &str = "Pro Plan";
pub const DEFAULT_CURRENCY: &str = "usd";
pub const DEFAULT_AMOUNT_CENTS: i64 = 1000;
pub const MIN_AMOUNT_CENTS: i64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionParams {
    pub unit_amount: i64,
    pub currency: String,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntentParams {
    pub amount: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

/// Payment operations the HTTP layer forwards to.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> anyhow::Result<CheckoutSession>;

    async fn create_payment_intent(
        &self,
        params: PaymentIntentParams,
    ) -> anyhow::Result<PaymentIntent>;
}

/// Rounds a caller-supplied amount (possibly fractional cents) to whole cents.
pub fn round_amount(amount: f64) -> i64 {
    amount.round() as i64
}
