//! Gemini backend — generateContent REST API over reqwest.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;
use crate::llm::LlmProvider;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini generateContent provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
        }
    }

    /// Build a provider from `GEMINI_API_KEY` / `GEMINI_MODEL`.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())?;
        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(SecretString::from(api_key), model))
    }

    fn api_url(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }

    /// Pull the response text out of a generateContent payload.
    fn extract_text(body: &serde_json::Value) -> Option<String> {
        let parts = body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() { None } else { Some(text) }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(self.api_url())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "gemini".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(LlmError::AuthFailed {
                provider: "gemini".into(),
            });
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: "gemini".into(),
                reason: format!("generateContent returned {status}: {detail}"),
            });
        }

        let payload: serde_json::Value =
            resp.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: "gemini".into(),
                reason: e.to_string(),
            })?;

        Self::extract_text(&payload).ok_or_else(|| LlmError::InvalidResponse {
            provider: "gemini".into(),
            reason: "no text in candidates".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_includes_model() {
        let provider = GeminiProvider::new(SecretString::from("k"), "gemini-2.5-flash");
        assert_eq!(
            provider.api_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn extract_text_joins_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
            }]
        });
        assert_eq!(
            GeminiProvider::extract_text(&body).as_deref(),
            Some("Hello world")
        );
    }

    #[test]
    fn extract_text_rejects_empty_payloads() {
        assert!(GeminiProvider::extract_text(&serde_json::json!({})).is_none());
        let no_text = serde_json::json!({
            "candidates": [{ "content": { "parts": [] } }]
        });
        assert!(GeminiProvider::extract_text(&no_text).is_none());
    }
}
