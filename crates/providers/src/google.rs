//! Search-augmented completion over HTTP (`POST /api/google`).

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::{SearchRequest, SearchService};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http;

pub struct GoogleSearchService {
    base_url: String,
    client: reqwest::Client,
}

/// `{ "message": .. }` on success, `{ "error": .. }` on failure.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    message: Option<SearchMessage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// The answer arrives either as plain text or as a full message object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchMessage {
    Text(String),
    Message { content: String },
}

impl GoogleSearchService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http::client(timeout),
        }
    }
}

#[async_trait]
impl SearchService for GoogleSearchService {
    fn name(&self) -> &str {
        "google"
    }

    async fn answer(&self, request: SearchRequest) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/api/google", self.base_url);
        debug!(
            model = %request.model.id,
            messages = request.messages.len(),
            "Sending search request"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(http::transport_error)?;

        if !response.status().is_success() {
            return Err(http::status_error(self.name(), response).await);
        }

        let text = response.text().await.map_err(http::transport_error)?;
        parse_answer(&text)
    }
}

fn parse_answer(body: &str) -> std::result::Result<String, ProviderError> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("search response: {e}")))?;

    match (parsed.message, parsed.error) {
        (Some(SearchMessage::Text(text)), _)
        | (Some(SearchMessage::Message { content: text }), _) => Ok(text),
        (None, Some(error)) => Err(ProviderError::ApiError {
            status_code: 200,
            message: match error {
                serde_json::Value::String(s) => s,
                other => http::service_message(&serde_json::json!({ "error": other }).to_string())
                    .unwrap_or_else(|| other.to_string()),
            },
        }),
        (None, None) => Err(ProviderError::MalformedResponse(
            "search response has neither a message nor an error".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Message;
    use parley_core::model::ModelSpec;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parse_answer_shapes() {
        assert_eq!(parse_answer(r#"{"message":"Sunny"}"#).unwrap(), "Sunny");
        assert_eq!(
            parse_answer(r#"{"message":{"role":"assistant","content":"Rainy"}}"#).unwrap(),
            "Rainy"
        );
        assert_eq!(
            parse_answer(r#"{"error":"quota exceeded"}"#)
                .unwrap_err()
                .service_message(),
            Some("quota exceeded")
        );
        assert!(matches!(
            parse_answer(r#"{}"#),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_answer("not json"),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn sends_search_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/google"))
            .and(body_partial_json(serde_json::json!({
                "googleAPIKey": "g-key",
                "googleCSEId": "cse-1"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "It is 12C"})),
            )
            .mount(&server)
            .await;

        let service = GoogleSearchService::new(server.uri(), Duration::from_secs(5));
        let answer = service
            .answer(SearchRequest {
                model: ModelSpec::fallback(),
                messages: vec![Message::user("Weather in Oslo?")],
                api_key: None,
                prompt: String::new(),
                temperature: 1.0,
                search_api_key: "g-key".into(),
                search_engine_id: "cse-1".into(),
            })
            .await
            .unwrap();
        assert_eq!(answer, "It is 12C");
    }
}
