use omniplex_core::config::Settings;
use omniplex_core::env::EnvSource;
use omniplex_core::llm::openai::OpenAiChatClient;
use omniplex_core::llm::ChatRelay;
use omniplex_core::stripe::client::StripeClient;
use omniplex_core::stripe::keys::StripeKeys;
use omniplex_core::stripe::PaymentGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub env: Arc<dyn EnvSource>,
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub webhook_secret: Option<String>,
    pub chat: Option<Arc<dyn ChatRelay>>,
}

impl AppState {
    /// Vendor clients that cannot be built leave their endpoints reporting misconfiguration.
    pub fn build(settings: Settings, env: Arc<dyn EnvSource>) -> Self {
        let keys = StripeKeys::resolve(env.as_ref());

        let payments: Option<Arc<dyn PaymentGateway>> = match keys.secret.as_ref() {
            Some(secret) => match StripeClient::from_secret_key(&secret.value) {
                Ok(client) => {
                    tracing::info!(source = ?secret.source, "stripe client initialised");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::warn!(error = %e, "stripe initialisation failed; payments disabled");
                    None
                }
            },
            None => {
                tracing::warn!("no valid stripe secret key found; payments disabled");
                None
            }
        };

        if keys.webhook_secret.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET missing; webhook deliveries will be rejected");
        }

        let chat: Option<Arc<dyn ChatRelay>> = match settings.openai_api_key.as_deref() {
            Some(_) => match OpenAiChatClient::from_settings(&settings) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::warn!(error = %e, "openai client initialisation failed; chat disabled");
                    None
                }
            },
            None => {
                tracing::warn!("OPENAI_API_KEY missing; chat disabled");
                None
            }
        };

        Self {
            settings: Arc::new(settings),
            env,
            payments,
            webhook_secret: keys.webhook_secret.map(|k| k.value),
            chat,
        }
    }
}
