use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument};

use crate::advice::dto::{AdviceQuery, AdviceResponse};
use crate::ident::UserId;
use crate::meals::dto::parse_date;
use crate::meals::repo::MealEntry;
use crate::nutrition::session::AdviceRequest;
use crate::profile::repo::Profile;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/advice", get(get_advice))
}

/// GET /advice?date=YYYY-MM-DD[&refresh=true][&model=...]
///
/// Serves the cached advice for the day unless a refresh is requested; the
/// engine decides between cache, a fresh generation, or a cooldown wait.
#[instrument(skip(state))]
pub async fn get_advice(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(q): Query<AdviceQuery>,
) -> Result<Json<AdviceResponse>, (StatusCode, String)> {
    let Some(date) = parse_date(&q.date) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "date must be YYYY-MM-DD".into(),
        ));
    };
    let model = q.model.as_deref().unwrap_or(&state.config.ai.default_model);

    let profile = Profile::get_or_default(&state.db, user_id)
        .await
        .map_err(internal)?;
    let entries = MealEntry::list_for_day(&state.db, user_id, date)
        .await
        .map_err(internal)?;

    let outcome = state
        .advice
        .request_advice(
            state.ai.as_ref(),
            OffsetDateTime::now_utc(),
            AdviceRequest {
                user_id,
                date,
                explicit_refresh: q.refresh,
                model,
                likes: &profile.likes,
                dislikes: &profile.dislikes,
                preferences: &profile.preferences,
                entries: &entries,
                targets: profile.targets(),
            },
        )
        .await;

    Ok(Json(outcome.into()))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
}
