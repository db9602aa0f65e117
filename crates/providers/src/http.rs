//! Shared HTTP plumbing: client construction and error-body mapping.

use parley_core::error::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Client for non-streamed requests; `timeout` bounds the whole exchange.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    build(reqwest::Client::builder().timeout(timeout))
}

/// Client for streamed responses. Only connecting and the gap between two
/// reads are bounded, so a long reply keeps flowing as long as bytes arrive.
pub(crate) fn streaming_client(
    connect_timeout: Duration,
    idle_timeout: Duration,
) -> reqwest::Client {
    build(
        reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(idle_timeout),
    )
}

fn build(builder: reqwest::ClientBuilder) -> reqwest::Client {
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to a default HTTP client");
        reqwest::Client::new()
    })
}

/// Map a transport failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`. Returns `None` for anything else.
pub(crate) fn service_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = match &value["error"] {
        serde_json::Value::Object(obj) => obj.get("message").and_then(|m| m.as_str()),
        serde_json::Value::String(s) => Some(s.as_str()),
        _ => value["message"].as_str(),
    }?;
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

/// Turn a non-success response into a [`ProviderError`].
///
/// The service-supplied message wins; the raw body is the fallback.
pub(crate) async fn status_error(service: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = retry_after_secs(response.headers());
    let body = response.text().await.unwrap_or_default();
    let message = service_message(&body).unwrap_or_else(|| body.trim().to_string());
    warn!(service, status, body = %body, "Service returned error");

    match status {
        401 | 403 => ProviderError::AuthenticationFailed(if message.is_empty() {
            "Invalid API key or insufficient permissions".into()
        } else {
            message
        }),
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after,
            message: if message.is_empty() {
                "Too many requests, try again later".into()
            } else {
                message
            },
        },
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    }
}

/// Seconds from a `Retry-After` header. HTTP dates are not interpreted.
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
