// Gemini `generateContent` provider and the provider factory.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CafeError, LlmError};

use super::{LlmProvider, TokenUsage};

const MAX_OUTPUT_TOKENS: u32 = 1024;

// ── Gemini Provider ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: crate::http::client(),
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: GeminiUsage,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GeminiResponse {
    /// Text of the first candidate, its parts joined. A blocked or empty
    /// answer yields an empty string.
    fn into_text_and_usage(self) -> (String, TokenUsage) {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();
        let usage = TokenUsage {
            input_tokens: self.usage_metadata.prompt_token_count,
            output_tokens: self.usage_metadata.candidates_token_count,
        };
        (text, usage)
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        debug!(model = %self.model, "Calling Gemini API");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CafeError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CafeError::Llm(LlmError::ApiError { status, body: text }));
        }

        let result: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| CafeError::Llm(LlmError::Parse(e.to_string())))?;

        Ok(result.into_text_and_usage())
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("pro") {
            0.00125
        } else {
            0.0003
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("pro") {
            0.01
        } else {
            0.0025
        }
    }
}

// ── Provider Factory ────────────────────────────────────────────────

/// Create an LLM provider from configuration.
pub fn create_provider(
    provider: &str,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> crate::error::Result<Box<dyn LlmProvider>> {
    match provider {
        "gemini" => {
            let mut p = GeminiProvider::new(api_key.to_string(), model.to_string());
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        other => Err(CafeError::Llm(LlmError::Config(format!(
            "Unknown provider: {other}. Only gemini is supported"
        )))),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_cost_tiers() {
        let flash = GeminiProvider::new("key".into(), "gemini-2.5-flash".into());
        let pro = GeminiProvider::new("key".into(), "gemini-2.5-pro".into());
        assert!(flash.cost_per_1k_input() < pro.cost_per_1k_input());
        assert!(flash.cost_per_1k_output() < pro.cost_per_1k_output());
    }

    #[test]
    fn gemini_response_decodes_multi_part_text() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"store_name\":"}, {"text": " null}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5}
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let (text, usage) = resp.into_text_and_usage();
        assert_eq!(text, "{\"store_name\": null}");
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 5);
    }

    #[test]
    fn gemini_response_tolerates_blocked_candidate() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        let (text, usage) = resp.into_text_and_usage();
        assert_eq!(text, "");
        assert_eq!(usage.output_tokens, 0);
    }

    #[test]
    fn gemini_response_without_candidates_is_empty() {
        let resp: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.into_text_and_usage().0, "");
    }

    #[test]
    fn create_provider_factory() {
        let p = create_provider("gemini", "gemini-2.5-flash", "key", None).unwrap();
        assert_eq!(p.name(), "gemini");
        assert_eq!(p.model_id(), "gemini-2.5-flash");

        let p = create_provider("gemini", "gemini-2.5-pro", "key", Some("http://localhost:8080"));
        assert!(p.is_ok());
    }

    #[test]
    fn create_provider_rejects_other_vendors() {
        for name in ["anthropic", "openai", "custom", "invalid"] {
            let p = create_provider(name, "model", "key", None);
            assert!(
                matches!(p, Err(CafeError::Llm(LlmError::Config(_)))),
                "{name} should be rejected"
            );
        }
    }
}
