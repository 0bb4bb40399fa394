use crate::config::LlmConfig;
use crate::error::{Nl2SqlError, Result};
use crate::llm::Translator;
use crate::prompt::SYSTEM_PROMPT;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Nl2SqlError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        debug!("Calling {} with a {} byte prompt", self.model, prompt.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = format!("LLM API error ({}): {}", status, error_text);
            return Err(if is_retryable_status(status) {
                Nl2SqlError::retryable_translation(message)
            } else {
                Nl2SqlError::translation(message)
            });
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Nl2SqlError::translation(format!("Failed to parse LLM response: {}", e)))?;

        extract_content(&response_json)
    }
}

#[async_trait]
impl Translator for LlmClient {
    async fn translate(&self, prompt: &str) -> Result<String> {
        self.call_llm(prompt).await
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Pull the first choice's message content out of a completion payload.
fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(Nl2SqlError::translation(format!("LLM API error: {}", error)));
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| Nl2SqlError::translation("No choices in LLM response"))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(Nl2SqlError::translation(
                "LLM response was filtered by content policy",
            ))
        }
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| Nl2SqlError::translation("No content in LLM response"))?;

    if content.trim().is_empty() {
        return Err(Nl2SqlError::translation("Empty content in LLM response"));
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_content() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}, "finish_reason": "stop"}]
        });
        assert_eq!(extract_content(&payload).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_error_payload() {
        let payload = json!({"error": {"message": "invalid api key"}});
        let err = extract_content(&payload).unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_or_filtered_content() {
        assert!(extract_content(&json!({"choices": []})).is_err());
        assert!(extract_content(&json!({"choices": [{"message": {"content": "  "}}]})).is_err());
        assert!(extract_content(&json!({
            "choices": [{"message": {"content": "x"}, "finish_reason": "content_filter"}]
        }))
        .is_err());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_request_body_is_low_temperature() {
        let config = LlmConfig {
            api_key: "k".into(),
            base_url: "http://localhost".into(),
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout: std::time::Duration::from_secs(5),
            max_attempts: 1,
            backoff: std::time::Duration::from_millis(1),
        };
        let body = LlmClient::new(&config).unwrap().request_body("prompt");
        assert_eq!(body["max_tokens"], 1000);
        assert!(body["temperature"].as_f64().unwrap() < 0.2);
        assert_eq!(body["messages"][1]["content"], "prompt");
    }
}
