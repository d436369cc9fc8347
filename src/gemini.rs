//! Gemini API client for analyst calls
//!
//! Uses a long-lived reqwest::Client for connection pooling.
//! Requests JSON output so responses can be parsed into opinion records.

use crate::error::AnalysisError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_BASE_URL, model),
            temperature: 0.4,
        })
    }

    /// Generate a JSON document from a system instruction and a user prompt
    pub async fn generate_json(&self, system_prompt: &str, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::Config(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: "application/json".to_string(),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            },
        };

        debug!(endpoint = %self.endpoint, "Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::RateLimited(error_text));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AnalysisError::Llm(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AnalysisError::Llm(format!("Gemini parse error: {}", e))
        })?;

        extract_text(gemini_response)
    }
}

fn extract_text(response: GeminiResponse) -> crate::Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::Llm("No response from Gemini API".to_string()))?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(AnalysisError::Llm("Gemini blocked the response".to_string()));
    }

    candidate
        .content
        .parts
        .into_iter()
        .next()
        .map(|part| part.text)
        .ok_or_else(|| AnalysisError::Llm("Empty response from Gemini".to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    response_mime_type: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Analyze this article".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: "application/json".to_string(),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are a fundamental analyst".to_string(),
                }],
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are a fundamental analyst");
    }

    #[test]
    fn test_extract_text_from_candidate() {
        let raw = r#"{
            "candidates": [
                {
                    "content": {"parts": [{"text": "{\"sentiment_score\": 0.3}"}]},
                    "finishReason": "STOP"
                }
            ]
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(response).unwrap(), "{\"sentiment_score\": 0.3}");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(extract_text(response), Err(AnalysisError::Llm(_))));
    }

    #[test]
    fn test_client_rejects_empty_key() {
        let client = GeminiClient::new(String::new(), "gemini-2.0-flash").unwrap();
        let result = tokio_test::block_on(client.generate_json("system", "prompt"));
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }
}
