use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::provider::{ChatMessage, UpstreamError, UpstreamResult};
use crate::http::client::{HttpClient, HttpResponseData};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;
const IMAGE_COUNT: u32 = 1;
const IMAGE_SIZE: &str = "512x512";

/// Relays chat completions and image generations to an OpenAI-compatible
/// API. The chat response body passes through unchanged; image responses are
/// reduced to the first returned URL.
#[derive(Debug, Clone)]
pub struct OpenAiForwarder {
    http: HttpClient,
    model: String,
    base_url: String,
}

impl OpenAiForwarder {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> UpstreamResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(UpstreamError::MissingApiKey)?;

        Ok(Self {
            http: HttpClient::new(client, Some(api_key), timeout),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends the message list with fixed generation parameters and returns
    /// the provider's response body verbatim.
    pub async fn complete(&self, messages: &[ChatMessage]) -> UpstreamResult<Value> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self.http.post_json(&url, &payload).await.map_err(classify)?;
        let body = successful_body(response)?;

        serde_json::from_str(&body).map_err(|err| UpstreamError::Parse(err.to_string()))
    }

    /// Requests one 512x512 image and returns its URL, discarding any other
    /// metadata the provider sends back.
    pub async fn generate_image(&self, prompt: &str) -> UpstreamResult<String> {
        let payload = ImageGenerationRequest {
            prompt,
            n: IMAGE_COUNT,
            size: IMAGE_SIZE,
        };
        let url = format!("{}/v1/images/generations", self.base_url);
        let response = self.http.post_json(&url, &payload).await.map_err(classify)?;
        let body = successful_body(response)?;

        let parsed: ImageGenerationResponse =
            serde_json::from_str(&body).map_err(|err| UpstreamError::Parse(err.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.url)
            .ok_or(UpstreamError::EmptyResponse)
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Transport(err.to_string())
    }
}

fn successful_body(response: HttpResponseData) -> UpstreamResult<String> {
    if !(200..300).contains(&response.status) {
        let body = response.body.chars().take(400).collect::<String>();
        return Err(UpstreamError::HttpStatus {
            status: response.status,
            body,
        });
    }
    Ok(response.body)
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: String,
}
