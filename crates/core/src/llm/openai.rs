use crate::config::Settings;
use crate::llm::error::LlmError;
use crate::llm::sse::SseTextDecoder;
use crate::llm::{ChatRelay, ChatRequest, TextStream};
use anyhow::Context;
use futures_util::StreamExt;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build openai http client")?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, &base_url, Duration::from_secs(timeout_secs))
    }

    fn request_body(&self, request: ChatRequest) -> anyhow::Result<serde_json::Value> {
        let mut body = serde_json::to_value(&request).context("failed to encode chat request")?;
        body["stream"] = serde_json::json!(true);
        if request.model.is_none() {
            body["model"] = serde_json::json!(self.default_model);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ChatRelay for OpenAiChatClient {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    async fn stream_chat(&self, request: ChatRequest) -> anyhow::Result<TextStream> {
        let body = self.request_body(request)?;
        let url = format!("{}/chat/completions", self.base_url);

        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(LlmError {
                stage: "http",
                status: Some(status.as_u16()),
                detail,
            }
            .into());
        }

        // The decoder is flushed once the body ends so an unterminated last event is kept.
        let upstream = res.bytes_stream().boxed();
        let deltas = futures_util::stream::unfold(
            (Some(upstream), SseTextDecoder::default()),
            |(mut upstream, mut decoder)| async move {
                let body = upstream.as_mut()?;
                match body.next().await {
                    Some(Ok(bytes)) => {
                        let texts = decoder.push(&bytes);
                        let upstream = if decoder.is_done() { None } else { upstream };
                        Some((Ok(texts), (upstream, decoder)))
                    }
                    Some(Err(err)) => {
                        let err = anyhow::Error::new(LlmError {
                            stage: "stream",
                            status: None,
                            detail: err.to_string(),
                        });
                        Some((Err(err), (None, decoder)))
                    }
                    None => {
                        let tail: Vec<String> = decoder.finish().into_iter().collect();
                        Some((Ok(tail), (None, decoder)))
                    }
                }
            },
        )
        .flat_map(|batch| {
            let items: Vec<anyhow::Result<String>> = match batch {
                Ok(texts) => texts.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            futures_util::stream::iter(items)
        });

        Ok(deltas.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use httpmock::prelude::*;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: Some(0.2),
            ..Default::default()
        }
    }

    #[test]
    fn request_body_forces_stream_and_fills_model() {
        let client =
            OpenAiChatClient::new("sk-test", DEFAULT_BASE_URL, Duration::from_secs(5)).unwrap();
        let body = client.request_body(request()).unwrap();

        assert_eq!(body["stream"], serde_json::json!(true));
        assert!(body["model"].is_string());
        assert_eq!(body["temperature"], serde_json::json!(0.2));
        assert!(body.get("top_p").is_none());
    }

    #[tokio::test]
    async fn relays_streamed_deltas() {
        let server = MockServer::start_async().await;
        let sse = [
            r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"Hi "}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"there"}}]}"#,
            "data: [DONE]",
        ]
        .join("\n\n");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .body_contains("\"stream\":true");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(format!("{sse}\n\n"));
            })
            .await;

        let client =
            OpenAiChatClient::new("sk-test", &server.base_url(), Duration::from_secs(5)).unwrap();
        let stream = client.stream_chat(request()).await.unwrap();
        let parts: Vec<String> = stream
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;

        mock.assert_async().await;
        assert_eq!(parts.concat(), "Hi there");
    }

    #[tokio::test]
    async fn keeps_unterminated_final_delta() {
        let server = MockServer::start_async().await;
        let body = [
            r#"data: {"choices":[{"index":0,"delta":{"content":"Hi "}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"tail"}}]}"#,
        ]
        .join("\n\n");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(body);
            })
            .await;

        let client =
            OpenAiChatClient::new("sk-test", &server.base_url(), Duration::from_secs(5)).unwrap();
        let parts: Vec<String> = client
            .stream_chat(request())
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;

        assert_eq!(parts.concat(), "Hi tail");
    }

    #[tokio::test]
    async fn maps_provider_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401)
                    .json_body(serde_json::json!({"error": {"message": "Incorrect API key provided"}}));
            })
            .await;

        let client =
            OpenAiChatClient::new("sk-bad", &server.base_url(), Duration::from_secs(5)).unwrap();
        let err = match client.stream_chat(request()).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        let llm_err = err.downcast_ref::<LlmError>().unwrap();
        assert_eq!(llm_err.status, Some(401));
        assert_eq!(llm_err.detail, "Incorrect API key provided");
    }
}
