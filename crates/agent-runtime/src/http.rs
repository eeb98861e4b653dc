//! Shared HTTP plumbing for provider adapters
//!
//! Failures are classified here, from status codes and transport error
//! classes, so the agent loop never inspects message text.

use std::time::Duration;

use agent_core::error::{AgentError, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

/// Build a client with a whole-request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a non-success HTTP status to a typed error
pub fn classify_status(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{status}: {}", truncate(body, 500));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        // Some backends report a bad key as a plain 400
        StatusCode::BAD_REQUEST if mentions_api_key(body) => AgentError::Auth(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AgentError::ConversationState(detail)
        }
        StatusCode::NOT_FOUND => AgentError::Config(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            AgentError::Network(detail)
        }
        _ => AgentError::Provider(detail),
    }
}

/// Map a reqwest transport failure to a typed error
pub fn classify_transport(err: &reqwest::Error) -> AgentError {
    if err.is_decode() {
        AgentError::Parse(err.to_string())
    } else if err.is_builder() {
        AgentError::Config(err.to_string())
    } else {
        // connect, timeout, request and body failures
        AgentError::Network(err.to_string())
    }
}

/// Send a request and decode a JSON body, classifying every failure
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder, provider: &str) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        tracing::warn!(provider, error = %e, "Request failed before a response");
        classify_transport(&e)
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| classify_transport(&e))?;

    tracing::debug!(provider, %status, body_len = body.len(), "Provider response");

    if !status.is_success() {
        let err = classify_status(status, &body);
        tracing::warn!(provider, %status, kind = %err.kind(), "Provider returned an error status");
        return Err(err);
    }

    serde_json::from_str(&body)
        .map_err(|e| AgentError::Parse(format!("failed to parse {provider} response: {e}")))
}

fn mentions_api_key(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("api key") || lower.contains("api_key")
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::error::ErrorKind;

    #[test]
    fn test_status_classification() {
        let kind = |status, body| classify_status(status, body).kind();

        assert_eq!(kind(StatusCode::BAD_REQUEST, "function call turn must follow user turn"), ErrorKind::State);
        assert_eq!(kind(StatusCode::UNPROCESSABLE_ENTITY, ""), ErrorKind::State);
        assert_eq!(kind(StatusCode::BAD_REQUEST, "API key not valid"), ErrorKind::Config);
        assert_eq!(kind(StatusCode::UNAUTHORIZED, ""), ErrorKind::Config);
        assert_eq!(kind(StatusCode::GATEWAY_TIMEOUT, ""), ErrorKind::Network);
        assert_eq!(kind(StatusCode::INTERNAL_SERVER_ERROR, ""), ErrorKind::Generic);

        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::RateLimited(_)
        ));
    }

    #[test]
    fn test_long_bodies_are_clipped() {
        let body = "x".repeat(2000);
        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.to_string().len() < 600);
    }
}
