use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::nutrition::estimator::RoundedMacros;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "meal_slot", rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }
}

/// One logged meal. Immutable once stored; the only mutation is deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_date: Date,
    pub slot: MealSlot,
    pub free_text: String,
    pub protein_g: i32,
    pub fat_g: i32,
    pub carb_g: i32,
    pub calories: i32,
    pub created_at: OffsetDateTime,
}

impl MealEntry {
    pub async fn insert(
        db: &PgPool,
        user_id: Uuid,
        meal_date: Date,
        slot: MealSlot,
        free_text: &str,
        macros: RoundedMacros,
    ) -> anyhow::Result<MealEntry> {
        let entry = sqlx::query_as::<_, MealEntry>(
            r#"
            INSERT INTO meal_entries
                (id, user_id, meal_date, slot, free_text, protein_g, fat_g, carb_g, calories)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, meal_date, slot, free_text,
                      protein_g, fat_g, carb_g, calories, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(meal_date)
        .bind(slot)
        .bind(free_text)
        .bind(macros.protein_g)
        .bind(macros.fat_g)
        .bind(macros.carb_g)
        .bind(macros.calories)
        .fetch_one(db)
        .await?;
        Ok(entry)
    }

    pub async fn list_for_day(
        db: &PgPool,
        user_id: Uuid,
        meal_date: Date,
    ) -> anyhow::Result<Vec<MealEntry>> {
        let rows = sqlx::query_as::<_, MealEntry>(
            r#"
            SELECT id, user_id, meal_date, slot, free_text,
                   protein_g, fat_g, carb_g, calories, created_at
            FROM meal_entries
            WHERE user_id = $1 AND meal_date = $2
            ORDER BY slot, created_at
            "#,
        )
        .bind(user_id)
        .bind(meal_date)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Delete an entry the user owns. Returns the day it belonged to so the
    /// caller can invalidate that day's advice.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Date>> {
        let row: Option<(Date,)> = sqlx::query_as(
            r#"
            DELETE FROM meal_entries
            WHERE id = $1 AND user_id = $2
            RETURNING meal_date
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|(d,)| d))
    }
}
