use serde::{Deserialize, Serialize};

use crate::profile::repo::Profile;

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileBody {
    pub target_calories: Option<i32>,
    pub target_protein_g: Option<i32>,
    pub target_fat_g: Option<i32>,
    pub target_carb_g: Option<i32>,
    pub likes: Option<String>,
    pub dislikes: Option<String>,
    pub preferences: Option<String>,
}

impl UpdateProfileBody {
    pub fn has_negative_target(&self) -> bool {
        [
            self.target_calories,
            self.target_protein_g,
            self.target_fat_g,
            self.target_carb_g,
        ]
        .iter()
        .any(|t| t.is_some_and(|v| v < 0))
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub target_calories: i32,
    pub target_protein_g: i32,
    pub target_fat_g: i32,
    pub target_carb_g: i32,
    pub likes: String,
    pub dislikes: String,
    pub preferences: String,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            target_calories: p.target_calories,
            target_protein_g: p.target_protein_g,
            target_fat_g: p.target_fat_g,
            target_carb_g: p.target_carb_g,
            likes: p.likes,
            dislikes: p.dislikes,
            preferences: p.preferences,
        }
    }
}
