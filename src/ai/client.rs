use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiConfig;

/// Error surfaced by the completion provider.
///
/// Provider SDKs do not expose stable structured error kinds, so the message
/// text is the whole surface; callers classify failures by matching status
/// markers (e.g. "429") embedded in it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CompletionError(pub String);

/// One entry of the provider's model listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, rename = "supportedGenerationMethods")]
    pub supported_generation_methods: Vec<String>,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a single prompt and return the generated text. One outbound call
    /// per invocation; retry policy belongs to the caller.
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError>;

    /// Enumerate the models the provider currently offers.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionError>;
}

// --- Gemini (Generative Language API) ---

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn first_text(response: GenerateResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        debug!(%model, "calling completion service");
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError(format!("failed to read response: {e}")))?;

        // Keep the numeric status in the message; quota errors are recognized
        // downstream by the "429" marker.
        if !status.is_success() {
            return Err(CompletionError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError(format!("malformed response: {e}")))?;
        first_text(parsed).ok_or_else(|| CompletionError("completion returned no text".into()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CompletionError(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(CompletionError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: ModelsResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError(format!("malformed response: {e}")))?;
        Ok(parsed.models)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_joins_candidate_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"cal\""},{"text":": 500}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_text(response).as_deref(), Some("{\"cal\": 500}"));
    }

    #[test]
    fn first_text_is_none_for_empty_candidates() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(first_text(response).is_none());
    }

    #[test]
    fn first_text_is_none_for_textless_parts() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#).unwrap();
        assert!(first_text(response).is_none());
    }

    #[test]
    fn model_listing_reads_generation_methods() {
        let parsed: ModelsResponse = serde_json::from_str(
            r#"{"models":[{"name":"models/gemini-2.5-flash","supportedGenerationMethods":["generateContent"]}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.models.len(), 1);
        assert_eq!(parsed.models[0].name, "models/gemini-2.5-flash");
        assert_eq!(
            parsed.models[0].supported_generation_methods,
            vec!["generateContent"]
        );
    }
}
