use tracing::warn;

use super::client::{CompletionClient, ModelInfo};

/// Served when the provider listing is unavailable.
pub const FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-2.0-flash",
];

/// Keep only models usable for text completion: they must advertise
/// `generateContent`, and embedding/image generators are dropped by name.
pub fn filter_completion_models(models: Vec<ModelInfo>) -> Vec<String> {
    models
        .into_iter()
        .filter(|m| {
            m.supported_generation_methods
                .iter()
                .any(|method| method == "generateContent")
        })
        .map(|m| m.name.trim_start_matches("models/").to_string())
        .filter(|name| !name.contains("embedding") && !name.contains("imagen"))
        .collect()
}

fn fallback() -> Vec<String> {
    FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
}

/// The model names offered to users. Never fails: any listing problem falls
/// back to the static defaults.
pub async fn available_models(client: &dyn CompletionClient) -> Vec<String> {
    match client.list_models().await {
        Ok(models) => {
            let filtered = filter_completion_models(models);
            if filtered.is_empty() {
                warn!("model listing contained no usable models, using fallback");
                fallback()
            } else {
                filtered
            }
        }
        Err(e) => {
            warn!(error = %e, "model listing failed, using fallback");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::testing::ScriptedClient;

    fn model(name: &str, methods: &[&str]) -> ModelInfo {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "supportedGenerationMethods": methods,
        }))
        .unwrap()
    }

    #[test]
    fn filter_keeps_completion_models_and_strips_prefix() {
        let models = vec![
            model("models/gemini-2.5-flash", &["generateContent"]),
            model("models/gemini-1.5-pro", &["generateContent", "countTokens"]),
        ];
        assert_eq!(
            filter_completion_models(models),
            vec!["gemini-2.5-flash", "gemini-1.5-pro"]
        );
    }

    #[test]
    fn filter_drops_embedding_and_image_models() {
        let models = vec![
            model("models/text-embedding-004", &["embedContent"]),
            model("models/gemini-embedding-001", &["generateContent"]),
            model("models/imagen-3.0", &["generateContent"]),
            model("models/gemini-2.5-flash", &["generateContent"]),
        ];
        assert_eq!(filter_completion_models(models), vec!["gemini-2.5-flash"]);
    }

    #[tokio::test]
    async fn listing_failure_falls_back_to_defaults() {
        let client = ScriptedClient::with_responses(vec![]);
        let models = available_models(&client).await;
        assert_eq!(models, fallback());
    }

    #[tokio::test]
    async fn empty_filtered_listing_falls_back_to_defaults() {
        let client = ScriptedClient::with_models(vec![model(
            "models/text-embedding-004",
            &["embedContent"],
        )]);
        let models = available_models(&client).await;
        assert_eq!(models, fallback());
    }

    #[tokio::test]
    async fn usable_listing_is_served_as_is() {
        let client = ScriptedClient::with_models(vec![model(
            "models/gemini-2.5-flash",
            &["generateContent"],
        )]);
        let models = available_models(&client).await;
        assert_eq!(models, vec!["gemini-2.5-flash"]);
    }
}
