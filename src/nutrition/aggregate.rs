use serde::Serialize;

use crate::meals::repo::MealEntry;

/// Daily nutrient goals. Defaults match the profile schema defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NutrientTarget {
    pub calories: i32,
    pub protein_g: i32,
    pub fat_g: i32,
    pub carb_g: i32,
}

impl Default for NutrientTarget {
    fn default() -> Self {
        Self {
            calories: 2000,
            protein_g: 100,
            fat_g: 60,
            carb_g: 250,
        }
    }
}

/// Sum of everything logged for one user and day. Derived, never stored;
/// recomputed from the current entry set on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub calories: i32,
    pub protein_g: i32,
    pub fat_g: i32,
    pub carb_g: i32,
}

impl DailyTotals {
    pub fn aggregate(entries: &[MealEntry]) -> Self {
        entries.iter().fold(Self::default(), |acc, e| Self {
            calories: acc.calories + e.calories,
            protein_g: acc.protein_g + e.protein_g,
            fat_g: acc.fat_g + e.fat_g,
            carb_g: acc.carb_g + e.carb_g,
        })
    }
}

/// Signed distance to target, one component per nutrient.
///
/// Positive means remaining allowance (deficit), zero or negative means the
/// target is met or exceeded (surplus). Zero sits on the surplus side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetDelta {
    pub calories: i32,
    pub protein_g: i32,
    pub fat_g: i32,
    pub carb_g: i32,
}

impl TargetDelta {
    pub fn between(totals: &DailyTotals, target: &NutrientTarget) -> Self {
        Self {
            calories: target.calories - totals.calories,
            protein_g: target.protein_g - totals.protein_g,
            fat_g: target.fat_g - totals.fat_g,
            carb_g: target.carb_g - totals.carb_g,
        }
    }
}

/// One-line progress summary shown above the day's chart, e.g.
/// `🔥 500 kcal left · P: -20g F: -20g C: -50g`.
pub fn summary_line(totals: &DailyTotals, target: &NutrientTarget) -> String {
    let delta = TargetDelta::between(totals, target);
    let calories = if delta.calories > 0 {
        format!("{} kcal left", delta.calories)
    } else {
        format!("{} kcal over", -delta.calories)
    };
    // P/F/C read from the intake side: negative is short of target, positive over.
    format!(
        "🔥 {} · P: {:+}g F: {:+}g C: {:+}g",
        calories,
        totals.protein_g - target.protein_g,
        totals.fat_g - target.fat_g,
        totals.carb_g - target.carb_g,
    )
}
