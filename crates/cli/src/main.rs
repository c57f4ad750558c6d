use anyhow::Context;
use clap::{Parser, Subcommand};
use omniplex_core::auth::AuthProjectConfig;
use omniplex_core::config::Settings;
use omniplex_core::env::{EnvSource, ProcessEnv, ResolvedKey};
use omniplex_core::stripe::keys::StripeKeys;
use omniplex_core::stripe::webhook;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "omniplex_cli")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show where each payment and auth setting resolves from. Values are truncated.
    CheckConfig {
        /// Exit with an error when the publishable or secret key is missing.
        #[arg(long)]
        strict: bool,
    },

    /// Print a `Stripe-Signature` header value for a payload, for local webhook testing.
    SignWebhook {
        /// Path to the JSON event body.
        #[arg(long)]
        payload: PathBuf,

        /// Unix timestamp to sign with. Defaults to now.
        #[arg(long)]
        timestamp: Option<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let env = ProcessEnv::new(settings.runtime_config_path.as_deref().map(PathBuf::from));

    match args.command {
        Command::CheckConfig { strict } => check_config(&env, &settings, strict),
        Command::SignWebhook { payload, timestamp } => sign_webhook(&env, &payload, timestamp),
    }
}

fn describe(key: Option<&ResolvedKey>) -> serde_json::Value {
    match key {
        Some(k) => serde_json::json!({ "source": k.source, "prefix": k.prefix(10) }),
        None => serde_json::Value::Null,
    }
}

fn check_config(env: &dyn EnvSource, settings: &Settings, strict: bool) -> anyhow::Result<()> {
    let keys = StripeKeys::resolve(env);
    let auth = AuthProjectConfig::from_env(env);

    let report = serde_json::json!({
        "appEnv": settings.app_env,
        "envDebugAllowed": settings.env_debug_allowed(),
        "stripe": {
            "publishableKey": describe(keys.publishable.as_ref()),
            "secretKey": describe(keys.secret.as_ref()),
            "webhookSecret": describe(keys.webhook_secret.as_ref()),
        },
        "chatConfigured": settings.openai_api_key.is_some(),
        "authConfigured": auth.is_configured(),
        "authProjectId": auth.project_id,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if strict {
        anyhow::ensure!(
            keys.publishable.is_some(),
            "no valid stripe publishable key (pk_) found"
        );
        anyhow::ensure!(keys.secret.is_some(), "no valid stripe secret key (sk_) found");
    }
    Ok(())
}

fn sign_webhook(
    env: &dyn EnvSource,
    payload_path: &Path,
    timestamp: Option<i64>,
) -> anyhow::Result<()> {
    let keys = StripeKeys::resolve(env);
    let secret = keys
        .webhook_secret()
        .context("STRIPE_WEBHOOK_SECRET (whsec_) is required")?;

    let payload = std::fs::read(payload_path)
        .with_context(|| format!("failed to read payload {}", payload_path.display()))?;
    serde_json::from_slice::<serde_json::Value>(&payload).context("payload is not valid JSON")?;

    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let header = webhook::sign_payload(&payload, secret, timestamp)?;
    tracing::debug!(timestamp, bytes = payload.len(), "signed webhook payload");
    println!("{header}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use omniplex_core::env::MapEnv;

    #[test]
    fn parses_subcommands() {
        let args = Args::parse_from(["omniplex_cli", "check-config", "--strict"]);
        assert!(matches!(args.command, Command::CheckConfig { strict: true }));

        let args = Args::parse_from([
            "omniplex_cli",
            "sign-webhook",
            "--payload",
            "event.json",
            "--timestamp",
            "1700000000",
        ]);
        match args.command {
            Command::SignWebhook { payload, timestamp } => {
                assert_eq!(payload, PathBuf::from("event.json"));
                assert_eq!(timestamp, Some(1_700_000_000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn strict_check_fails_without_keys() {
        let settings = Settings {
            app_env: None,
            enable_env_debug: false,
            openai_api_key: None,
            sentry_dsn: None,
            runtime_config_path: None,
        };
        assert!(check_config(&MapEnv::new(), &settings, false).is_ok());
        assert!(check_config(&MapEnv::new(), &settings, true).is_err());
    }

    #[test]
    fn sign_requires_webhook_secret() {
        let err = sign_webhook(&MapEnv::new(), Path::new("missing.json"), None).unwrap_err();
        assert!(err.to_string().contains("STRIPE_WEBHOOK_SECRET"));
    }
}
