use crate::state::AppState;
use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::StreamExt;
use omniplex_core::config::Settings;
use omniplex_core::env::{EnvSource, MapEnv};
use omniplex_core::llm::{ChatRelay, ChatRequest, TextStream};
use omniplex_core::stripe::keys::StripeKeys;
use omniplex_core::stripe::{
    CheckoutSession, CheckoutSessionParams, PaymentGateway, PaymentIntent, PaymentIntentParams,
};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_route_tests";

#[derive(Default)]
pub struct FakeGateway {
    pub fail_with: Option<String>,
    pub checkout_calls: Mutex<Vec<CheckoutSessionParams>>,
    pub intent_calls: Mutex<Vec<PaymentIntentParams>>,
}

impl FakeGateway {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> anyhow::Result<CheckoutSession> {
        if let Some(msg) = &self.fail_with {
            anyhow::bail!("{msg}");
        }
        self.checkout_calls.lock().unwrap().push(params);
        Ok(CheckoutSession {
            id: "cs_test_fake".to_string(),
            url: Some("https://checkout.test/cs_test_fake".to_string()),
        })
    }

    async fn create_payment_intent(
        &self,
        params: PaymentIntentParams,
    ) -> anyhow::Result<PaymentIntent> {
        if let Some(msg) = &self.fail_with {
            anyhow::bail!("{msg}");
        }
        self.intent_calls.lock().unwrap().push(params);
        Ok(PaymentIntent {
            id: "pi_test_fake".to_string(),
            client_secret: Some("pi_test_fake_secret".to_string()),
        })
    }
}

pub struct FakeChat {
    pub chunks: Vec<&'static str>,
}

#[async_trait::async_trait]
impl ChatRelay for FakeChat {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn stream_chat(&self, _request: ChatRequest) -> anyhow::Result<TextStream> {
        let items: Vec<anyhow::Result<String>> =
            self.chunks.iter().map(|c| Ok(c.to_string())).collect();
        Ok(futures_util::stream::iter(items).boxed())
    }
}

pub fn settings(app_env: Option<&str>, enable_env_debug: bool) -> Settings {
    Settings {
        app_env: app_env.map(str::to_string),
        enable_env_debug,
        openai_api_key: None,
        sentry_dsn: None,
        runtime_config_path: None,
    }
}

pub fn state_with(env: MapEnv, payments: Option<Arc<FakeGateway>>) -> AppState {
    state_full(settings(None, false), env, payments, None)
}

pub fn state_full(
    settings: Settings,
    env: impl EnvSource + 'static,
    payments: Option<Arc<FakeGateway>>,
    chat: Option<Arc<FakeChat>>,
) -> AppState {
    let env: Arc<dyn EnvSource> = Arc::new(env);
    let keys = StripeKeys::resolve(env.as_ref());
    AppState {
        settings: Arc::new(settings),
        env,
        payments: payments.map(|g| g as Arc<dyn PaymentGateway>),
        webhook_secret: keys.webhook_secret.map(|k| k.value),
        chat: chat.map(|c| c as Arc<dyn ChatRelay>),
    }
}

pub async fn send(state: AppState, req: Request<Body>) -> Response<Body> {
    crate::routes::router(state).oneshot(req).await.unwrap()
}

pub async fn get(state: AppState, path: &str) -> Response<Body> {
    send(state, Request::get(path).body(Body::empty()).unwrap()).await
}

pub async fn post_json(state: AppState, path: &str, body: serde_json::Value) -> Response<Body> {
    let req = Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(state, req).await
}

pub async fn body_text(res: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(res).await).unwrap()
}
