use crate::error::{parse_json, ApiError};
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use omniplex_core::llm::ChatRequest;

const NOT_CONFIGURED: &str = "OpenAI API key is not configured. AI features are disabled.";

pub(crate) async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(relay) = state.chat.as_ref() else {
        return Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, NOT_CONFIGURED));
    };

    let request: ChatRequest = parse_json(&body)?;
    tracing::debug!(
        provider = relay.provider_name(),
        messages = request.messages.len(),
        model = ?request.model,
        "relaying chat completion"
    );

    let deltas = relay
        .stream_chat(request)
        .await
        .map_err(|e| ApiError::vendor(e, "chat completion"))?
        .inspect_err(|e| tracing::error!(error = %e, "chat stream aborted"));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(deltas),
    )
        .into_response())
}
