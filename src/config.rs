use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdviceConfig {
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub ai: AiConfig,
    pub advice: AdviceConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let ai = AiConfig {
            api_key: std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY")?,
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
            default_model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".into()),
        };
        let advice = AdviceConfig {
            cooldown_seconds: std::env::var("ADVICE_COOLDOWN_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        Ok(Self {
            database_url,
            ai,
            advice,
        })
    }
}
