//! The model provider seam.
//!
//! [`Brain`] is the single capability the relay needs: generate a JSON value
//! that conforms to a response schema. [`GeminiBrain`] implements it against
//! the Gemini `generateContent` REST endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum BrainError {
    #[error("GEMINI_API_KEY not set in environment")]
    MissingApiKey,
    #[error("request to model provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model provider error ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("no content in model response")]
    EmptyResponse,
    #[error("prompt blocked by model provider: {0}")]
    Blocked(String),
    #[error("failed to parse model response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("model response violates contract: {0}")]
    Contract(String),
    /// Raised by stub providers in tests and by callers that wrap foreign errors.
    #[error("{0}")]
    Other(String),
}

/// One structured completion request.
#[derive(Debug, Clone)]
pub struct Generation<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub schema: &'a Value,
}

#[async_trait]
pub trait Brain: Send + Sync {
    async fn generate_structured(&self, request: Generation<'_>) -> Result<Value, BrainError>;
}

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBrain {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiBrain {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BrainError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl Brain for GeminiBrain {
    async fn generate_structured(&self, request: Generation<'_>) -> Result<Value, BrainError> {
        let api_key = self.api_key.as_deref().ok_or(BrainError::MissingApiKey)?;

        debug!(
            model = request.model,
            prompt_chars = request.prompt.chars().count(),
            "sending structured generation request"
        );
        let started = Instant::now();

        let response = self
            .client
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": request.prompt }]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": request.schema,
                }
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Unknown API error".to_string());
            warn!(status = status.as_u16(), %message, "model provider returned an error");
            return Err(BrainError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model provider replied"
        );

        let text = response_text(serde_json::from_str(&body)?)?;
        Ok(serde_json::from_str(strip_markdown_json(&text))?)
    }
}

/// Best description of a failed call: `error.message` from a JSON body,
/// otherwise the raw body text.
fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return Some(message.to_string());
        }
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenated text parts of the first candidate.
fn response_text(body: Value) -> Result<String, BrainError> {
    let response: GeminiResponse = serde_json::from_value(body)?;
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(BrainError::Blocked(reason));
    }
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(BrainError::EmptyResponse);
    }
    Ok(text)
}

/// Strip a ```json fence if the model wrapped its output in one.
fn strip_markdown_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_candidate_text() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"valid_indices\":" }, { "text": "[1]}" }] }
            }]
        });
        assert_eq!(response_text(body).unwrap(), "{\"valid_indices\":[1]}");
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let body = json!({ "candidates": [] });
        assert!(matches!(response_text(body), Err(BrainError::EmptyResponse)));
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_markdown_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_json("```\n{}\n```"), "{}");
        assert_eq!(strip_markdown_json("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_json("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = response_text(body).unwrap_err();
        assert!(matches!(err, BrainError::Blocked(ref r) if r == "SAFETY"));
        assert_eq!(err.to_string(), "prompt blocked by model provider: SAFETY");
    }

    #[tokio::test]
    async fn missing_key_fails_at_invocation() {
        let brain = GeminiBrain::new(None, DEFAULT_BASE_URL, Duration::from_secs(1)).unwrap();
        assert!(!brain.has_api_key());

        let schema = json!({});
        let err = brain
            .generate_structured(Generation {
                model: "gemini-2.5-flash",
                prompt: "hi",
                schema: &schema,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::MissingApiKey));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let brain =
            GeminiBrain::new(Some("  ".into()), DEFAULT_BASE_URL, Duration::from_secs(1)).unwrap();
        assert!(!brain.has_api_key());
    }

    #[test]
    fn endpoint_joins_model() {
        let brain = GeminiBrain::new(
            Some("k".into()),
            "http://localhost:9000/v1beta/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            brain.endpoint("gemini-2.5-flash"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    mod provider {
        use super::*;
        use axum::Router;
        use axum::extract::State;
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::post;
        use std::sync::{Arc, Mutex};

        #[derive(Default)]
        struct Captured {
            path: String,
            api_key: Option<String>,
            body: Value,
        }

        type Shared = Arc<Mutex<Captured>>;

        /// Local stand-in for the Gemini API answering every call with
        /// `status` and `body`. Returns the base URL and the captured request.
        async fn fake_gemini(status: StatusCode, body: &'static str) -> (String, Shared) {
            let captured: Shared = Arc::default();
            let app = Router::new()
                .route(
                    "/v1beta/models/{call}",
                    post(
                        move |State(captured): State<Shared>,
                              uri: axum::http::Uri,
                              headers: HeaderMap,
                              request: String| async move {
                            let mut c = captured.lock().unwrap();
                            c.path = uri.path().to_string();
                            c.api_key = headers
                                .get("x-goog-api-key")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            c.body = serde_json::from_str(&request).unwrap_or_default();
                            (status, body)
                        },
                    ),
                )
                .with_state(captured.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{}/v1beta", addr), captured)
        }

        fn brain(base_url: String) -> GeminiBrain {
            GeminiBrain::new(Some("test-key".into()), base_url, Duration::from_secs(5)).unwrap()
        }

        async fn call(brain: &GeminiBrain, schema: &Value) -> Result<Value, BrainError> {
            brain
                .generate_structured(Generation {
                    model: "gemini-2.5-flash",
                    prompt: "Classify these labels",
                    schema,
                })
                .await
        }

        #[tokio::test]
        async fn sends_constrained_request_and_parses_reply() {
            let reply = r#"{"candidates":[{"content":{"parts":[{"text":"```json\n{\"valid_indices\":[0,2]}\n```"}]}}]}"#;
            let (base_url, captured) = fake_gemini(StatusCode::OK, reply).await;
            let schema = json!({ "type": "OBJECT" });

            let value = call(&brain(base_url), &schema).await.unwrap();
            assert_eq!(value, json!({ "valid_indices": [0, 2] }));

            let c = captured.lock().unwrap();
            assert_eq!(c.path, "/v1beta/models/gemini-2.5-flash:generateContent");
            assert_eq!(c.api_key.as_deref(), Some("test-key"));
            assert_eq!(c.body["contents"][0]["parts"][0]["text"], "Classify these labels");
            assert_eq!(
                c.body["generationConfig"]["responseMimeType"],
                "application/json"
            );
            assert_eq!(c.body["generationConfig"]["responseSchema"], schema);
        }

        #[tokio::test]
        async fn json_error_body_maps_to_provider_error() {
            let (base_url, _) = fake_gemini(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"code":429,"message":"quota"}}"#,
            )
            .await;
            let err = call(&brain(base_url), &json!({})).await.unwrap_err();
            assert!(matches!(
                err,
                BrainError::Provider { status: 429, ref message } if message == "quota"
            ));
        }

        #[tokio::test]
        async fn plain_text_error_body_keeps_status() {
            let (base_url, _) = fake_gemini(StatusCode::SERVICE_UNAVAILABLE, "upstream down").await;
            let err = call(&brain(base_url), &json!({})).await.unwrap_err();
            assert!(matches!(
                err,
                BrainError::Provider { status: 503, ref message } if message == "upstream down"
            ));
            assert!(!err.to_string().contains("127.0.0.1"));
        }

        #[tokio::test]
        async fn empty_error_body_uses_status_reason() {
            let (base_url, _) = fake_gemini(StatusCode::BAD_GATEWAY, "").await;
            let err = call(&brain(base_url), &json!({})).await.unwrap_err();
            assert_eq!(err.to_string(), "model provider error (502): Bad Gateway");
        }
    }
}
