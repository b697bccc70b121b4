use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::ai::client::{CompletionClient, CompletionError};
use crate::meals::repo::{MealEntry, MealSlot};
use crate::nutrition::aggregate::{DailyTotals, NutrientTarget};

/// Why a call into the estimation/advice pipeline failed.
///
/// `TooShort` and `ParseFailure` are terminal per-call results; only the two
/// service variants are allowed to trip the advice cooldown.
#[derive(Debug, thiserror::Error)]
pub enum EstimationError {
    #[error("meal description is too short")]
    TooShort,
    #[error("could not parse estimator output")]
    ParseFailure { raw: String },
    #[error("completion service rate limited: {message}")]
    RateLimited { message: String },
    #[error("completion service failed: {message}")]
    ServiceFailure { message: String },
}

/// Raw estimator output. Values are advisory floats; round once with
/// [`MacroEstimate::rounded`] before persisting.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroEstimate {
    pub protein_g: f64,
    pub fat_g: f64,
    pub carb_g: f64,
    pub calories: f64,
    pub advice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundedMacros {
    pub protein_g: i32,
    pub fat_g: i32,
    pub carb_g: i32,
    pub calories: i32,
}

impl MacroEstimate {
    pub fn rounded(&self) -> RoundedMacros {
        let round = |v: f64| v.round().max(0.0) as i32;
        RoundedMacros {
            protein_g: round(self.protein_g),
            fat_g: round(self.fat_g),
            carb_g: round(self.carb_g),
            calories: round(self.calories),
        }
    }
}

/// Everything the advice prompts know about the user's day.
pub struct AdviceContext<'a> {
    pub likes: &'a str,
    pub dislikes: &'a str,
    pub preferences: &'a str,
    pub entries: &'a [MealEntry],
    pub totals: DailyTotals,
    pub targets: NutrientTarget,
    /// Slot currently being recorded, for the combined estimate-plus-advice call.
    pub slot: Option<MealSlot>,
}

impl AdviceContext<'_> {
    pub fn meals_detail(&self) -> String {
        if self.entries.is_empty() {
            return "none recorded".to_string();
        }
        let mut entries: Vec<&MealEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| (e.slot, e.created_at));
        entries
            .iter()
            .map(|e| {
                format!(
                    "- {}: {} ({} kcal / P:{}g F:{}g C:{}g)",
                    e.slot.label(),
                    e.free_text,
                    e.calories,
                    e.protein_g,
                    e.fat_g,
                    e.carb_g
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn unlogged_slots(&self) -> String {
        let logged: HashSet<MealSlot> = self.entries.iter().map(|e| e.slot).collect();
        let missing: Vec<&str> = MealSlot::ALL
            .iter()
            .filter(|s| !logged.contains(s))
            .map(|s| s.label())
            .collect();
        if missing.is_empty() {
            "none".to_string()
        } else {
            missing.join(", ")
        }
    }

    fn block(&self) -> String {
        format!(
            "Daily targets: {} kcal, P: {}g, F: {}g, C: {}g\n\
             Eaten so far: {} kcal, P: {}g, F: {}g, C: {}g\n\
             Meals today:\n{}\n\
             Slots not logged yet: {}\n\
             Likes: {}\nDislikes: {}\nNotes: {}",
            self.targets.calories,
            self.targets.protein_g,
            self.targets.fat_g,
            self.targets.carb_g,
            self.totals.calories,
            self.totals.protein_g,
            self.totals.fat_g,
            self.totals.carb_g,
            self.meals_detail(),
            self.unlogged_slots(),
            self.likes,
            self.dislikes,
            self.preferences,
        )
    }
}

pub(crate) fn build_estimation_prompt(text: &str, context: Option<&AdviceContext<'_>>) -> String {
    match context {
        None => format!(
            "You are a nutrition assistant. Estimate the calories, protein (P), \
             fat (F) and carbohydrate (C) of the meal below.\n\n\
             Meal: \"{text}\"\n\n\
             Answer with a single JSON object and nothing else (no Markdown):\n\
             {{\"cal\": int, \"p\": int, \"f\": int, \"c\": int}}\n\
             Example: {{\"cal\": 500, \"p\": 20, \"f\": 15, \"c\": 60}}"
        ),
        Some(ctx) => {
            let slot = ctx.slot.map_or("meal", MealSlot::label);
            format!(
                "You are a nutrition assistant. The user is recording a {slot}. \
                 Estimate the calories, protein (P), fat (F) and carbohydrate (C) \
                 of the meal below, then give one short, encouraging coaching tip \
                 that accounts for the rest of their day.\n\n\
                 Meal: \"{text}\"\n\n\
                 {}\n\n\
                 Answer with a single JSON object and nothing else (no Markdown):\n\
                 {{\"cal\": int, \"p\": int, \"f\": int, \"c\": int, \"advice\": string}}",
                ctx.block()
            )
        }
    }
}

pub(crate) fn build_advice_prompt(context: &AdviceContext<'_>) -> String {
    format!(
        "You are an upbeat personal trainer. Review what the user has eaten \
         today against their daily targets and write a short piece of advice, \
         around three sentences. Point out any nutrient that is still short \
         and anything already over target.\n\n{}",
        context.block()
    )
}

/// Pull a JSON object out of completion output: drop Markdown fences, and if
/// the remainder still fails to parse, take the first balanced `{...}` block.
fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    if let Ok(value) = serde_json::from_str(cleaned.trim()) {
        return Some(value);
    }
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&raw[start..=start + offset]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

fn classify(error: CompletionError) -> EstimationError {
    if error.0.contains("429") {
        EstimationError::RateLimited { message: error.0 }
    } else {
        EstimationError::ServiceFailure { message: error.0 }
    }
}

/// Turn free-text into a macro estimate with exactly one completion call.
///
/// With a context the combined variant is used and the response may carry an
/// `advice` string alongside the macros. Missing numeric keys default to 0;
/// the call is never retried here.
pub async fn estimate(
    client: &dyn CompletionClient,
    text: &str,
    model: &str,
    context: Option<&AdviceContext<'_>>,
) -> Result<MacroEstimate, EstimationError> {
    if text.chars().count() < 2 {
        return Err(EstimationError::TooShort);
    }

    let prompt = build_estimation_prompt(text, context);
    let raw = client.complete(&prompt, model).await.map_err(classify)?;
    debug!(chars = raw.len(), "estimator output received");

    let value = extract_json(&raw).ok_or_else(|| EstimationError::ParseFailure {
        raw: raw.clone(),
    })?;
    let Some(object) = value.as_object() else {
        return Err(EstimationError::ParseFailure { raw });
    };

    let number = |key: &str| object.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    let advice = object
        .get("advice")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    Ok(MacroEstimate {
        protein_g: number("p"),
        fat_g: number("f"),
        carb_g: number("c"),
        calories: number("cal"),
        advice,
    })
}

/// Generate standalone coaching advice for the day. Plain-text response, one
/// completion call, no retry.
pub async fn generate_advice(
    client: &dyn CompletionClient,
    model: &str,
    context: &AdviceContext<'_>,
) -> Result<String, EstimationError> {
    let prompt = build_advice_prompt(context);
    let raw = client.complete(&prompt, model).await.map_err(classify)?;
    Ok(raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::testing::ScriptedClient;
    use time::macros::date;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn entry(slot: MealSlot, text: &str, calories: i32) -> MealEntry {
        MealEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            meal_date: date!(2026 - 08 - 06),
            slot,
            free_text: text.into(),
            protein_g: 30,
            fat_g: 10,
            carb_g: 50,
            calories,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn context(entries: &[MealEntry]) -> AdviceContext<'_> {
        AdviceContext {
            likes: "chicken",
            dislikes: "celery",
            preferences: "cutting",
            entries,
            totals: DailyTotals::aggregate(entries),
            targets: NutrientTarget::default(),
            slot: Some(MealSlot::Lunch),
        }
    }

    #[tokio::test]
    async fn too_short_input_never_reaches_the_service() {
        let client = ScriptedClient::replying(r#"{"cal": 1}"#);
        let err = estimate(&client, "a", "gemini-2.5-flash", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::TooShort));
        assert_eq!(client.calls(), 0);

        let err = estimate(&client, "", "gemini-2.5-flash", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::TooShort));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn plain_json_is_parsed() {
        let client = ScriptedClient::replying(r#"{"cal": 500, "p": 30, "f": 15, "c": 60}"#);
        let est = estimate(&client, "chicken and rice", "gemini-2.5-flash", None)
            .await
            .unwrap();
        assert_eq!(est.calories, 500.0);
        assert_eq!(est.protein_g, 30.0);
        assert_eq!(est.fat_g, 15.0);
        assert_eq!(est.carb_g, 60.0);
        assert!(est.advice.is_none());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn markdown_fences_are_stripped() {
        let client =
            ScriptedClient::replying("```json\n{\"cal\": 400, \"p\": 25, \"f\": 10, \"c\": 50}\n```");
        let est = estimate(&client, "chicken salad", "gemini-2.5-flash", None)
            .await
            .unwrap();
        assert_eq!(est.calories, 400.0);
        assert_eq!(est.protein_g, 25.0);
    }

    #[tokio::test]
    async fn surrounding_prose_falls_back_to_balanced_block() {
        let client = ScriptedClient::replying(
            "Here is your estimate: {\"cal\": 350, \"p\": 12, \"f\": 8, \"c\": 55} enjoy!",
        );
        let est = estimate(&client, "onigiri", "gemini-2.5-flash", None)
            .await
            .unwrap();
        assert_eq!(est.calories, 350.0);
        assert_eq!(est.carb_g, 55.0);
    }

    #[tokio::test]
    async fn missing_keys_default_to_zero() {
        let client = ScriptedClient::replying(r#"{"cal": 300}"#);
        let est = estimate(&client, "mystery snack", "gemini-2.5-flash", None)
            .await
            .unwrap();
        assert_eq!(est.calories, 300.0);
        assert_eq!(est.protein_g, 0.0);
        assert_eq!(est.fat_g, 0.0);
        assert_eq!(est.carb_g, 0.0);
    }

    #[tokio::test]
    async fn non_json_output_is_a_parse_failure_carrying_the_raw_text() {
        let client = ScriptedClient::replying("this is not JSON");
        let err = estimate(&client, "tofu bowl", "gemini-2.5-flash", None)
            .await
            .unwrap_err();
        match err {
            EstimationError::ParseFailure { raw } => assert_eq!(raw, "this is not JSON"),
            other => panic!("expected ParseFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_json_is_a_parse_failure() {
        let client = ScriptedClient::replying("[1, 2, 3]");
        let err = estimate(&client, "tofu bowl", "gemini-2.5-flash", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::ParseFailure { .. }));
    }

    #[tokio::test]
    async fn quota_errors_classify_as_rate_limited() {
        let client = ScriptedClient::failing("HTTP 429: quota exceeded");
        let err = estimate(&client, "protein shake", "gemini-2.5-flash", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn other_errors_classify_as_service_failure() {
        let client = ScriptedClient::failing("HTTP 500: backend exploded");
        let err = estimate(&client, "protein shake", "gemini-2.5-flash", None)
            .await
            .unwrap_err();
        match err {
            EstimationError::ServiceFailure { message } => {
                assert!(message.contains("backend exploded"));
            }
            other => panic!("expected ServiceFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn combined_variant_captures_advice() {
        let client = ScriptedClient::replying(
            r#"{"cal": 620, "p": 42, "f": 18, "c": 70, "advice": "Great protein, keep dinner light."}"#,
        );
        let entries = vec![entry(MealSlot::Breakfast, "eggs on toast", 420)];
        let ctx = context(&entries);
        let est = estimate(&client, "chicken and rice", "gemini-2.5-flash", Some(&ctx))
            .await
            .unwrap();
        assert_eq!(
            est.advice.as_deref(),
            Some("Great protein, keep dinner light.")
        );

        let prompt = client.last_prompt().unwrap();
        assert!(prompt.contains("lunch"));
        assert!(prompt.contains("eggs on toast"));
        assert!(prompt.contains("\"advice\""));
    }

    #[tokio::test]
    async fn blank_advice_is_treated_as_absent() {
        let client = ScriptedClient::replying(r#"{"cal": 620, "advice": "  "}"#);
        let entries = vec![];
        let ctx = context(&entries);
        let est = estimate(&client, "chicken and rice", "gemini-2.5-flash", Some(&ctx))
            .await
            .unwrap();
        assert!(est.advice.is_none());
    }

    #[test]
    fn rounding_clamps_below_zero_and_rounds_half_up() {
        let est = MacroEstimate {
            protein_g: 29.5,
            fat_g: 10.4,
            carb_g: -3.0,
            calories: 499.6,
            advice: None,
        };
        let rounded = est.rounded();
        assert_eq!(rounded.protein_g, 30);
        assert_eq!(rounded.fat_g, 10);
        assert_eq!(rounded.carb_g, 0);
        assert_eq!(rounded.calories, 500);
    }

    #[test]
    fn meals_detail_lists_slot_order_or_placeholder() {
        let entries = vec![
            entry(MealSlot::Dinner, "salmon", 600),
            entry(MealSlot::Breakfast, "oatmeal", 350),
        ];
        let ctx = context(&entries);
        let detail = ctx.meals_detail();
        let breakfast = detail.find("breakfast").unwrap();
        let dinner = detail.find("dinner").unwrap();
        assert!(breakfast < dinner);

        let empty: Vec<MealEntry> = vec![];
        assert_eq!(context(&empty).meals_detail(), "none recorded");
    }

    #[test]
    fn unlogged_slots_names_the_gaps() {
        let entries = vec![entry(MealSlot::Breakfast, "oatmeal", 350)];
        let ctx = context(&entries);
        assert_eq!(ctx.unlogged_slots(), "lunch, dinner, snack");
    }

    #[tokio::test]
    async fn advice_prompt_carries_targets_and_preferences() {
        let client = ScriptedClient::replying("Eat more protein at dinner.\n");
        let entries = vec![entry(MealSlot::Breakfast, "oatmeal", 350)];
        let ctx = context(&entries);
        let advice = generate_advice(&client, "gemini-2.5-flash", &ctx)
            .await
            .unwrap();
        assert_eq!(advice, "Eat more protein at dinner.");

        let prompt = client.last_prompt().unwrap();
        assert!(prompt.contains("2000 kcal"));
        assert!(prompt.contains("oatmeal"));
        assert!(prompt.contains("Likes: chicken"));
        assert!(prompt.contains("Slots not logged yet: lunch, dinner, snack"));
    }
}
