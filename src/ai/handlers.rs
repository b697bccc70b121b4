use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::ai::catalog;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}

#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = catalog::available_models(state.ai.as_ref()).await;
    Json(ModelsResponse {
        models,
        default_model: state.config.ai.default_model.clone(),
    })
}
