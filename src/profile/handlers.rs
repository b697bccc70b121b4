use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use crate::ident::UserId;
use crate::profile::dto::{ProfileResponse, UpdateProfileBody};
use crate::profile::repo::Profile;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let profile = Profile::get_or_default(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    if body.has_negative_target() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "targets must be non-negative".into(),
        ));
    }
    let profile = Profile::upsert(&state.db, user_id, &body)
        .await
        .map_err(internal)?;
    Ok(Json(profile.into()))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
}
