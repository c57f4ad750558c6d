use crate::env::{resolve_with_retry, EnvSource, ResolvedKey};

pub const PUBLISHABLE_KEY_VAR: &str = "NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY";
pub const SECRET_KEY_VAR: &str = "STRIPE_SECRET_KEY";
pub const WEBHOOK_SECRET_VAR: &str = "STRIPE_WEBHOOK_SECRET";

pub const PUBLISHABLE_MARKER: &str = "pk_";
pub const SECRET_MARKER: &str = "sk_";
pub const WEBHOOK_SECRET_MARKER: &str = "whsec_";

#[derive(Debug, Clone, Default)]
pub struct StripeKeys {
    pub publishable: Option<ResolvedKey>,
    pub secret: Option<ResolvedKey>,
    pub webhook_secret: Option<ResolvedKey>,
}

impl StripeKeys {
    pub fn resolve(env: &dyn EnvSource) -> Self {
        let keys = Self {
            publishable: resolve_with_retry(env, PUBLISHABLE_KEY_VAR, PUBLISHABLE_MARKER),
            secret: resolve_with_retry(env, SECRET_KEY_VAR, SECRET_MARKER),
            webhook_secret: resolve_with_retry(env, WEBHOOK_SECRET_VAR, WEBHOOK_SECRET_MARKER),
        };

        tracing::debug!(
            publishable = ?keys.publishable.as_ref().map(|k| k.source),
            secret = ?keys.secret.as_ref().map(|k| k.source),
            webhook_secret = keys.webhook_secret.is_some(),
            "resolved stripe keys"
        );
        keys
    }

    pub fn publishable_key(&self) -> Option<&str> {
        self.publishable.as_ref().map(|k| k.value.as_str())
    }

    pub fn secret_key(&self) -> Option<&str> {
        self.secret.as_ref().map(|k| k.value.as_str())
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_ref().map(|k| k.value.as_str())
    }
}
