use std::sync::Arc;

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

use crate::{
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    service::{background_jobs::SchedulerStatus, reward_evaluator::PassSummary},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct PassResponseDto {
    pub status: String,
    pub data: PassSummary,
}

#[derive(Debug, Serialize)]
pub struct LastPassData {
    pub summary: Option<PassSummary>,
    pub scheduler: SchedulerStatus,
}

#[derive(Debug, Serialize)]
pub struct LastPassResponseDto {
    pub status: String,
    pub data: LastPassData,
}

pub fn rewards_handler() -> Router {
    Router::new()
        .route("/run", post(run_reward_pass))
        .route("/last-pass", get(get_last_pass))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        }))
}

pub async fn run_reward_pass(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!(admin_id = %user.user.id, "Manual reward pass requested");

    let summary = app_state.rewards.trigger(&app_state.shutdown).await?;

    Ok(Json(PassResponseDto {
        status: "success".to_string(),
        data: summary,
    }))
}

pub async fn get_last_pass(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(LastPassResponseDto {
        status: "success".to_string(),
        data: LastPassData {
            summary: app_state.rewards.last_summary(),
            scheduler: app_state.rewards.status(),
        },
    }))
}
