//! HTTP surface: JSON routes over shared [`AppState`].
//!
//! Every failure is converted to `{"error": <message>}` here; diagnostic
//! detail stays in the logs and generic text goes to the client.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::llm::DEFAULT_SYSTEM_PROMPT;
use crate::llm::openai::OpenAiForwarder;
use crate::llm::provider::{ChatMessage, UpstreamError};
use crate::store::{PromptConfig, PromptStore, StoreError};

/// Shared per-request state, built once at startup and cloned into handlers.
/// Either half may be absent: the process keeps listening in a degraded
/// state when the store fails to open or the provider credential is missing.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<PromptStore>,
    pub forwarder: Option<OpenAiForwarder>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Validation(String),
    UpstreamTimeout,
    Upstream,
    StoreUnavailable,
    Store,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::UpstreamTimeout => write!(f, "Upstream request timed out"),
            Self::Upstream => write!(f, "Failed to get response from provider"),
            Self::StoreUnavailable => write!(f, "Prompt store is unavailable"),
            Self::Store => write!(f, "Prompt store operation failed"),
        }
    }
}

impl Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream | Self::StoreUnavailable | Self::Store => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmptyContent => Self::Validation("Prompt content is required".to_string()),
            StoreError::Database(detail) => {
                error!("prompt store error: {detail}");
                Self::Store
            }
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout => {
                warn!("upstream call timed out");
                Self::UpstreamTimeout
            }
            other => {
                error!("upstream call failed: {other}");
                Self::Upstream
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/prompt", get(get_prompt).put(put_prompt))
        .route("/prompt/history", get(get_prompt_history))
        .route("/chat", post(post_chat))
        .route("/image/generate", post(post_generate_image))
        .with_state(state)
}

/// Serves the router on an existing listener. Tests bind `127.0.0.1:0` and
/// pass the listener in.
pub async fn run_on_listener(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("listening on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UpdatePromptRequest {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Option<Vec<ChatMessage>>,
    #[serde(rename = "userPrompt")]
    user_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateImageRequest {
    prompt: Option<String>,
}

async fn get_prompt(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let store = state.store.as_ref().ok_or(ApiError::StoreUnavailable)?;
    let prompt = store
        .current()
        .await?
        .map(|record| record.content)
        .unwrap_or_default();
    Ok(Json(json!({ "prompt": prompt })))
}

async fn put_prompt(
    State(state): State<AppState>,
    Json(request): Json<UpdatePromptRequest>,
) -> Result<Json<PromptConfig>, ApiError> {
    let content = request
        .content
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation("Prompt content is required".to_string()))?;

    let store = state.store.as_ref().ok_or(ApiError::StoreUnavailable)?;
    let created = store.create(content).await?;
    Ok(Json(created))
}

async fn get_prompt_history(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let store = state.store.as_ref().ok_or(ApiError::StoreUnavailable)?;
    let history = store.history().await?;
    Ok(Json(json!({ "history": history })))
}

/// Accepts both call shapes: a pre-built `messages` list or a single
/// `userPrompt` string. Either way the resolved system instruction is
/// prepended and the provider body is returned verbatim.
async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let caller_messages = match request {
        ChatRequest {
            messages: Some(messages),
            ..
        } if !messages.is_empty() => messages,
        ChatRequest {
            user_prompt: Some(prompt),
            ..
        } if !prompt.trim().is_empty() => vec![ChatMessage::user(prompt)],
        _ => {
            return Err(ApiError::Validation(
                "Either messages or userPrompt is required".to_string(),
            ));
        }
    };

    let forwarder = state.forwarder.as_ref().ok_or_else(|| {
        error!("chat request received but no provider credential is configured");
        ApiError::Upstream
    })?;

    let system_prompt = resolve_system_prompt(state.store.as_ref()).await;
    let mut messages = Vec::with_capacity(caller_messages.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(caller_messages);

    let body = forwarder.complete(&messages).await?;
    Ok(Json(body))
}

async fn post_generate_image(
    State(state): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> Result<Json<Value>, ApiError> {
    let prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation("Image prompt is required".to_string()))?;

    let forwarder = state.forwarder.as_ref().ok_or_else(|| {
        error!("image request received but no provider credential is configured");
        ApiError::Upstream
    })?;

    let url = forwarder.generate_image(prompt).await?;
    Ok(Json(json!({ "imageUrl": url })))
}

/// Latest stored prompt, or the hard-coded fallback when the store is
/// unavailable, unreadable, or empty. A store failure here degrades to the
/// fallback instead of failing the chat request.
async fn resolve_system_prompt(store: Option<&PromptStore>) -> String {
    let Some(store) = store else {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    };

    match store.current().await {
        Ok(Some(record)) => record.content,
        Ok(None) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(err) => {
            warn!("failed to read current prompt, using fallback: {err}");
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}
