use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod openai;
pub mod sse;

/// Text deltas relayed from a streaming chat completion.
pub type TextStream = BoxStream<'static, anyhow::Result<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Sampling parameters are forwarded untouched; unset ones are left to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

#[async_trait::async_trait]
pub trait ChatRelay: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn stream_chat(&self, request: ChatRequest) -> anyhow::Result<TextStream>;
}
