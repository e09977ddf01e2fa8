//! Natural-language rationale for a prediction.
//!
//! A `TextGenerator` turns a prompt into prose. `GeminiClient` implements it
//! against the Google Gemini `generateContent` endpoint; rationale is always
//! optional, so callers log failures instead of failing the prediction.

use crate::config::RationaleConfig;
use crate::error::RationaleError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Fallible, rate-limited text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, RationaleError>;
}

/// Google Gemini text generation client.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client from configuration.
    ///
    /// Uses `config.api_key`, falling back to the environment variable named by
    /// `config.api_key_env`. Returns `RationaleError::MissingApiKey` if neither is set.
    pub fn new(config: &RationaleConfig) -> Result<Self, RationaleError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()))
            .ok_or_else(|| RationaleError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &RationaleConfig, api_key: String) -> Result<Self, RationaleError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RationaleError::Request {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_request_body(prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        })
    }

    /// Map an HTTP status code to the appropriate `RationaleError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> RationaleError {
        match status.as_u16() {
            401 | 403 => RationaleError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            429 => RationaleError::RateLimited {
                retry_after_secs: 30,
            },
            _ => RationaleError::Request {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
        }
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_response(response: &Value) -> Result<String, RationaleError> {
        let parts = response["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| RationaleError::ResponseParse {
                message: "response has no candidate content".to_string(),
            })?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        if text.trim().is_empty() {
            return Err(RationaleError::ResponseParse {
                message: "No response generated.".to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, RationaleError> {
        debug!(model = self.model.as_str(), "Sending Gemini rationale request");

        let response = self
            .client
            .post(self.endpoint_url())
            .header("content-type", "application/json")
            .json(&Self::build_request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RationaleError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    RationaleError::Request {
                        message: format!("Request to Gemini API failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| RationaleError::ResponseParse {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| RationaleError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;
        Self::parse_response(&response_json)
    }
}

/// Prompt asking why `predicted_label` was predicted for the given attributes.
///
/// `attributes` is rendered as `name: value` pairs in schema order.
pub fn rationale_prompt(predicted_label: &str, attributes: &[(String, String)]) -> String {
    let data = attributes
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Given the predicted mental health condition: {predicted_label},\n\
         provide a natural language explanation for why this prediction was made \
         based on the following user data:\n{data}."
    )
}

/// Prompt asking for coping mechanisms and next steps.
pub fn coping_prompt(predicted_label: &str) -> String {
    format!(
        "Given the predicted mental health condition: {predicted_label},\n\
         Suggest coping mechanisms and next steps."
    )
}
