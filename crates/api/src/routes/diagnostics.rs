use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use omniplex_core::auth::AuthProjectConfig;
use omniplex_core::env::resolve::platform_name;
use omniplex_core::env::{key_prefix, EnvSource};
use omniplex_core::stripe::keys::{StripeKeys, PUBLISHABLE_KEY_VAR, SECRET_KEY_VAR};
use serde_json::{json, Value};
use std::sync::Arc;

const PREFIX_LEN: usize = 10;

fn keys_matching(env: &dyn EnvSource, pred: impl Fn(&str) -> bool) -> Vec<String> {
    let mut keys: Vec<String> = env.keys().into_iter().filter(|k| pred(k)).collect();
    keys.sort();
    keys
}

/// Resolution may re-read the runtime config file, so it runs off the async workers.
async fn resolve_keys(env: Arc<dyn EnvSource>) -> StripeKeys {
    tokio::task::spawn_blocking(move || StripeKeys::resolve(env.as_ref()))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "stripe key resolution task failed");
            StripeKeys::default()
        })
}

/// Always 200: the body says whether the publishable key could be resolved.
pub(crate) async fn stripe_config(State(state): State<AppState>) -> Json<Value> {
    let keys = resolve_keys(state.env.clone()).await;
    let env = state.env.as_ref();
    let app_env = state.settings.app_env.clone();

    tracing::info!(
        has_publishable_key = keys.publishable.is_some(),
        has_secret_key = keys.secret.is_some(),
        app_env = ?app_env,
        "stripe config request"
    );

    match keys.publishable.as_ref() {
        Some(publishable) => Json(json!({
            "publishableKey": publishable.value,
            "configured": true,
            "source": publishable.source,
            "debug": {
                "hasPublishableKey": true,
                "hasSecretKey": keys.secret.is_some(),
                "appEnv": app_env,
                "keyPrefix": publishable.prefix(PREFIX_LEN),
            }
        })),
        None => {
            let stripe_keys = keys_matching(env, |k| k.contains("STRIPE"));
            tracing::warn!(available = ?stripe_keys, "stripe publishable key not found or invalid");
            Json(json!({
                "publishableKey": null,
                "configured": false,
                "error": "Stripe publishable key not found or invalid",
                "debug": {
                    "hasPublishableKey": false,
                    "hasSecretKey": keys.secret.is_some(),
                    "appEnv": app_env,
                    "availableStripeKeys": stripe_keys,
                    "allNextPublicKeys": keys_matching(env, |k| k.starts_with("NEXT_PUBLIC")),
                }
            }))
        }
    }
}

pub(crate) async fn auth_config(State(state): State<AppState>) -> Json<Value> {
    let config = AuthProjectConfig::from_env(state.env.as_ref());
    let configured = config.is_configured();
    if !configured {
        tracing::debug!("auth project not configured; sign-in disabled");
    }
    Json(json!({
        "configured": configured,
        "config": config,
    }))
}

pub(crate) async fn debug_env(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if !state.settings.env_debug_allowed() {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "Environment debug is disabled in production",
        ));
    }

    let keys = resolve_keys(state.env.clone()).await;
    let env = state.env.as_ref();
    let prefix_of = |name: &str| {
        env.var(name)
            .map(|v| key_prefix(&v, PREFIX_LEN))
            .unwrap_or_else(|| "not found".to_string())
    };
    let present = |name: &str| env.var(name).is_some_and(|v| !v.is_empty());

    let platform_publishable = platform_name(PUBLISHABLE_KEY_VAR);
    let platform_secret = platform_name(SECRET_KEY_VAR);

    Ok(Json(json!({
        "appEnv": state.settings.app_env,
        "hasStripePublishableKey": present(PUBLISHABLE_KEY_VAR),
        "hasStripeSecretKey": present(SECRET_KEY_VAR),
        "hasAppSettingPublishableKey": present(&platform_publishable),
        "hasAppSettingSecretKey": present(&platform_secret),
        "stripePublishableKeyPrefix": prefix_of(PUBLISHABLE_KEY_VAR),
        "stripeSecretKeyPrefix": prefix_of(SECRET_KEY_VAR),
        "appSettingPublishableKeyPrefix": prefix_of(&platform_publishable),
        "appSettingSecretKeyPrefix": prefix_of(&platform_secret),
        "resolvedPublishableKeySource": keys.publishable.as_ref().map(|k| k.source),
        "resolvedSecretKeySource": keys.secret.as_ref().map(|k| k.source),
        "allEnvKeys": keys_matching(env, |k| {
            k.contains("STRIPE") || k.contains("NEXT_PUBLIC") || k.contains("APPSETTING")
        }),
        "totalEnvKeysCount": env.keys().len(),
    })))
}
