use serde::{Deserialize, Serialize};

use crate::nutrition::session::{AdviceOutcome, AdviceSource};

#[derive(Debug, Deserialize)]
pub struct AdviceQuery {
    pub date: String,
    #[serde(default)]
    pub refresh: bool,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub source: &'static str,
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<AdviceOutcome> for AdviceResponse {
    fn from(outcome: AdviceOutcome) -> Self {
        match outcome.source {
            AdviceSource::Cached => Self {
                source: "cached",
                text: outcome.text,
                wait_seconds: None,
                message: None,
            },
            AdviceSource::Fresh => Self {
                source: "fresh",
                text: outcome.text,
                wait_seconds: None,
                message: None,
            },
            AdviceSource::Blocked { wait_seconds } => Self {
                source: "blocked",
                text: outcome.text,
                wait_seconds: Some(wait_seconds),
                message: None,
            },
            AdviceSource::Failed { message, .. } => Self {
                source: "error",
                text: outcome.text,
                wait_seconds: None,
                message: Some(message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_outcome_exposes_the_wait() {
        let response: AdviceResponse = AdviceOutcome {
            text: Some("old advice".into()),
            source: AdviceSource::Blocked { wait_seconds: 42 },
        }
        .into();
        assert_eq!(response.source, "blocked");
        assert_eq!(response.wait_seconds, Some(42));
        assert_eq!(response.text.as_deref(), Some("old advice"));
    }

    #[test]
    fn failed_outcome_keeps_the_message() {
        let response: AdviceResponse = AdviceOutcome {
            text: None,
            source: AdviceSource::Failed {
                rate_limited: true,
                message: "AI request limit reached".into(),
            },
        }
        .into();
        assert_eq!(response.source, "error");
        assert_eq!(response.message.as_deref(), Some("AI request limit reached"));
    }
}
