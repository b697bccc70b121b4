use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use uuid::Uuid;

use crate::meals::repo::{MealEntry, MealSlot};
use crate::nutrition::aggregate::{DailyTotals, NutrientTarget, TargetDelta};

/// Calendar-date keys are ISO 8601 (`YYYY-MM-DD`) everywhere on the wire.
const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub(crate) fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, DATE_FORMAT).ok()
}

pub(crate) fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

#[derive(Debug, Deserialize)]
pub struct LogMealBody {
    pub date: String,
    pub slot: MealSlot,
    pub text: String,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct MealResponse {
    pub id: Uuid,
    pub date: String,
    pub slot: MealSlot,
    pub text: String,
    pub protein_g: i32,
    pub fat_g: i32,
    pub carb_g: i32,
    pub calories: i32,
}

impl From<MealEntry> for MealResponse {
    fn from(e: MealEntry) -> Self {
        Self {
            id: e.id,
            date: format_date(e.meal_date),
            slot: e.slot,
            text: e.free_text,
            protein_g: e.protein_g,
            fat_g: e.fat_g,
            carb_g: e.carb_g,
            calories: e.calories,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedMealResponse {
    pub meal: MealResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DaySummaryResponse {
    pub date: String,
    pub totals: DailyTotals,
    pub targets: NutrientTarget,
    pub delta: TargetDelta,
    pub summary: String,
}
