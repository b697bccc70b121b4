use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::aggregate::NutrientTarget;
use crate::profile::dto::UpdateProfileBody;

/// Per-user settings: daily targets plus free-text food preferences fed into
/// the advice prompts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub target_calories: i32,
    pub target_protein_g: i32,
    pub target_fat_g: i32,
    pub target_carb_g: i32,
    pub likes: String,
    pub dislikes: String,
    pub preferences: String,
    pub updated_at: OffsetDateTime,
}

impl Profile {
    pub fn targets(&self) -> NutrientTarget {
        NutrientTarget {
            calories: self.target_calories,
            protein_g: self.target_protein_g,
            fat_g: self.target_fat_g,
            carb_g: self.target_carb_g,
        }
    }

    fn defaults(user_id: Uuid) -> Self {
        let target = NutrientTarget::default();
        Self {
            user_id,
            target_calories: target.calories,
            target_protein_g: target.protein_g,
            target_fat_g: target.fat_g,
            target_carb_g: target.carb_g,
            likes: String::new(),
            dislikes: String::new(),
            preferences: String::new(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// The stored profile, or defaults for a user who never saved one.
    pub async fn get_or_default(db: &PgPool, user_id: Uuid) -> anyhow::Result<Profile> {
        let row = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, target_calories, target_protein_g, target_fat_g, target_carb_g,
                   likes, dislikes, preferences, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row.unwrap_or_else(|| Self::defaults(user_id)))
    }

    pub async fn upsert(
        db: &PgPool,
        user_id: Uuid,
        changes: &UpdateProfileBody,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles
                (user_id, target_calories, target_protein_g, target_fat_g, target_carb_g,
                 likes, dislikes, preferences)
            VALUES ($1, COALESCE($2, 2000), COALESCE($3, 100), COALESCE($4, 60),
                    COALESCE($5, 250), COALESCE($6, ''), COALESCE($7, ''), COALESCE($8, ''))
            ON CONFLICT (user_id) DO UPDATE SET
                target_calories  = COALESCE($2, profiles.target_calories),
                target_protein_g = COALESCE($3, profiles.target_protein_g),
                target_fat_g     = COALESCE($4, profiles.target_fat_g),
                target_carb_g    = COALESCE($5, profiles.target_carb_g),
                likes            = COALESCE($6, profiles.likes),
                dislikes         = COALESCE($7, profiles.dislikes),
                preferences      = COALESCE($8, profiles.preferences),
                updated_at       = now()
            RETURNING user_id, target_calories, target_protein_g, target_fat_g, target_carb_g,
                      likes, dislikes, preferences, updated_at
            "#,
        )
        .bind(user_id)
        .bind(changes.target_calories)
        .bind(changes.target_protein_g)
        .bind(changes.target_fat_g)
        .bind(changes.target_carb_g)
        .bind(changes.likes.as_deref())
        .bind(changes.dislikes.as_deref())
        .bind(changes.preferences.as_deref())
        .fetch_one(db)
        .await?;
        Ok(profile)
    }
}
