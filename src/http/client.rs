use super::redact::{redact_header_value, redact_text_body, redact_url, truncate_for_log};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const MAX_LOGGED_BODY_CHARS: usize = 4_000;

/// Outbound JSON poster: bearer-authenticated, timeout-bounded, with
/// debug-level request/response logging. Secrets are redacted before any
/// log line is emitted.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    bearer_token: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}

impl HttpClient {
    pub fn new(inner: Client, bearer_token: Option<String>, timeout: Duration) -> Self {
        Self {
            inner,
            bearer_token,
            timeout,
        }
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let mut builder = self.inner.post(url).timeout(self.timeout).json(payload);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let request = builder.build()?;

        let body_json = serde_json::to_string(payload)
            .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"));
        log_request(&request, &body_json);

        let response = self.inner.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        log_response(status, &headers, &body);

        Ok(HttpResponseData { status, body })
    }
}

fn log_request(request: &reqwest::Request, body_json: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let headers = request
        .headers()
        .iter()
        .map(|(name, value)| format!("{}: {}", name.as_str(), redact_header_value(name.as_str(), value)))
        .collect::<Vec<_>>()
        .join(", ");
    let body = truncate_for_log(&redact_text_body(body_json), MAX_LOGGED_BODY_CHARS);
    debug!(
        method = %request.method(),
        url = %redact_url(request.url()),
        %headers,
        %body,
        "outbound request"
    );
}

fn log_response(status: u16, headers: &reqwest::header::HeaderMap, body: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let headers = headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name.as_str(), redact_header_value(name.as_str(), value)))
        .collect::<Vec<_>>()
        .join(", ");
    let body = truncate_for_log(&redact_text_body(body), MAX_LOGGED_BODY_CHARS);
    debug!(status, %headers, %body, "outbound response");
}
