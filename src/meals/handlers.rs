use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::ident::UserId;
use crate::meals::dto::{
    parse_date, CreatedMealResponse, DayQuery, DaySummaryResponse, LogMealBody, MealResponse,
};
use crate::meals::repo::MealEntry;
use crate::nutrition::aggregate::{summary_line, DailyTotals, TargetDelta};
use crate::nutrition::estimator::{self, AdviceContext, EstimationError};
use crate::profile::repo::Profile;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(log_meal).get(list_meals))
        .route("/meals/:id", delete(delete_meal))
        .route("/summary", get(day_summary))
}

/// POST /meals — estimate the meal with the AI, then persist it.
///
/// The entry is committed before any advice derived from it is published, so
/// subsequent advice reads never see totals ahead of the stored entries.
#[instrument(skip(state, body))]
pub async fn log_meal(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<LogMealBody>,
) -> Result<(StatusCode, Json<CreatedMealResponse>), (StatusCode, String)> {
    let Some(date) = parse_date(&body.date) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "date must be YYYY-MM-DD".into(),
        ));
    };
    let model = body.model.as_deref().unwrap_or(&state.config.ai.default_model);

    let profile = Profile::get_or_default(&state.db, user_id)
        .await
        .map_err(internal)?;
    let prior = MealEntry::list_for_day(&state.db, user_id, date)
        .await
        .map_err(internal)?;

    let context = AdviceContext {
        likes: &profile.likes,
        dislikes: &profile.dislikes,
        preferences: &profile.preferences,
        entries: &prior,
        totals: DailyTotals::aggregate(&prior),
        targets: profile.targets(),
        slot: Some(body.slot),
    };
    let estimate = estimator::estimate(state.ai.as_ref(), &body.text, model, Some(&context))
        .await
        .map_err(estimation_error)?;

    let entry = MealEntry::insert(
        &state.db,
        user_id,
        date,
        body.slot,
        &body.text,
        estimate.rounded(),
    )
    .await
    .map_err(internal)?;

    if let Some(advice) = estimate.advice.clone() {
        state
            .advice
            .store_fresh(user_id, date, advice, OffsetDateTime::now_utc());
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatedMealResponse {
            meal: entry.into(),
            advice: estimate.advice,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(q): Query<DayQuery>,
) -> Result<Json<Vec<MealResponse>>, (StatusCode, String)> {
    let Some(date) = parse_date(&q.date) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "date must be YYYY-MM-DD".into(),
        ));
    };
    let entries = MealEntry::list_for_day(&state.db, user_id, date)
        .await
        .map_err(internal)?;
    Ok(Json(entries.into_iter().map(MealResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match MealEntry::delete(&state.db, user_id, id)
        .await
        .map_err(internal)?
    {
        Some(date) => {
            // the day's totals changed under the cached advice
            state.advice.invalidate(user_id, date);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err((StatusCode::NOT_FOUND, "Meal not found".into())),
    }
}

#[instrument(skip(state))]
pub async fn day_summary(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(q): Query<DayQuery>,
) -> Result<Json<DaySummaryResponse>, (StatusCode, String)> {
    let Some(date) = parse_date(&q.date) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "date must be YYYY-MM-DD".into(),
        ));
    };
    let profile = Profile::get_or_default(&state.db, user_id)
        .await
        .map_err(internal)?;
    let entries = MealEntry::list_for_day(&state.db, user_id, date)
        .await
        .map_err(internal)?;

    let totals = DailyTotals::aggregate(&entries);
    let targets = profile.targets();
    Ok(Json(DaySummaryResponse {
        date: q.date,
        totals,
        targets,
        delta: TargetDelta::between(&totals, &targets),
        summary: summary_line(&totals, &targets),
    }))
}

fn estimation_error(e: EstimationError) -> (StatusCode, String) {
    match e {
        EstimationError::TooShort => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "meal description is too short".into(),
        ),
        EstimationError::ParseFailure { raw } => {
            warn!(raw = %raw, "estimator returned unparseable output");
            (
                StatusCode::BAD_GATEWAY,
                "could not understand the AI estimate".into(),
            )
        }
        EstimationError::RateLimited { message } => {
            warn!(message = %message, "estimation rate limited");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "AI request limit reached, try again later".into(),
            )
        }
        EstimationError::ServiceFailure { message } => {
            error!(message = %message, "estimation failed");
            (StatusCode::BAD_GATEWAY, "meal estimation failed".into())
        }
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "internal error");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
}
