use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::GenerativeModel;
use crate::error::AppError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub timeout: Duration,
}

/// Gemini `generateContent` over REST, asking for a JSON response body.
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, model);
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Classifier(format!("API request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Classifier(format!("API error {}: {}", status, text)));
        }

        let api_resp: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::Classifier(format!("Failed to parse API response: {}", e)))?;

        response_text(&api_resp)
            .ok_or_else(|| AppError::Classifier("No text in API response".to_string()))
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(api_resp: &serde_json::Value) -> Option<String> {
    let parts = api_resp["candidates"]
        .as_array()
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate["content"]["parts"].as_array())?;

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}
