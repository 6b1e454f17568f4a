use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        CreateReferralDto, FilterReferralDto, ReferralData, ReferralListResponseDto,
        ReferralProgressDto, ReferralResponseDto, RequestQueryDto, Response, UpdateReferralDto,
    },
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::{referralmodel::Referral, usermodel::UserRole},
    service::error::ServiceError,
    AppState,
};

pub fn referrals_handler() -> Router {
    Router::new()
        .route("/", post(create_referral).get(get_referrals))
        .route(
            "/:id",
            get(get_referral)
                .put(update_referral)
                .delete(delete_referral),
        )
        .route(
            "/:id/progress",
            patch(update_referral_progress)
                .layer(middleware::from_fn(|state, req, next| {
                    role_check(state, req, next, vec![UserRole::Admin])
                })),
        )
}

fn referral_response(referral: &Referral) -> ReferralResponseDto {
    ReferralResponseDto {
        status: "success".to_string(),
        data: ReferralData {
            referral: FilterReferralDto::filter_referral(referral),
        },
    }
}

/// Loads a referral the caller may act on: their own, or any when
/// `admin_allowed` and the caller is an admin.
async fn load_referral(
    app_state: &AppState,
    caller: &JWTAuthMiddeware,
    referral_id: Uuid,
    admin_allowed: bool,
) -> Result<Referral, ServiceError> {
    let referral = app_state.db_client
        .get_referral(referral_id)
        .await?
        .ok_or(ServiceError::ReferralNotFound(referral_id))?;

    let is_owner = referral.referrer_id == caller.user.id;
    if !is_owner && !(admin_allowed && caller.is_admin()) {
        return Err(ServiceError::UnauthorizedReferralAccess(caller.user.id, referral_id));
    }

    Ok(referral)
}

pub async fn create_referral(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let referral = app_state.db_client
        .create_referral(
            user.user.id,
            body.candidate_email.trim().to_string(),
            body.description,
        )
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(referral_id = %referral.id, referrer_id = %user.user.id, "Referral created");

    Ok((StatusCode::CREATED, Json(referral_response(&referral))))
}

pub async fn get_referrals(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);

    let referrer_id = if user.is_admin() { None } else { Some(user.user.id) };

    let referrals = app_state.db_client
        .get_referrals(referrer_id, page as u32, limit)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ReferralListResponseDto {
        status: "success".to_string(),
        results: referrals.len(),
        referrals: FilterReferralDto::filter_referrals(&referrals),
    }))
}

pub async fn get_referral(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let referral = load_referral(&app_state, &user, referral_id, true).await?;

    Ok(Json(referral_response(&referral)))
}

pub async fn update_referral(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    load_referral(&app_state, &user, referral_id, false).await?;

    let referral = app_state.db_client
        .update_referral_details(
            referral_id,
            body.candidate_email.map(|email| email.trim().to_string()),
            body.description,
        )
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::ReferralNotFound(referral_id))?;

    Ok(Json(referral_response(&referral)))
}

pub async fn update_referral_progress(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ReferralProgressDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    if body.hiring_date.is_none() && body.status.is_none() {
        return Err(ServiceError::Validation("hiringDate or status is required".to_string()).into());
    }

    let referral = app_state.db_client
        .update_referral_progress(
            referral_id,
            body.hiring_date,
            body.status.map(|status| status.trim().to_string()),
        )
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::ReferralNotFound(referral_id))?;

    tracing::info!(
        referral_id = %referral.id,
        hiring_date = ?referral.hiring_date,
        status = %referral.status,
        "Referral progress updated"
    );

    Ok(Json(referral_response(&referral)))
}

pub async fn delete_referral(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    load_referral(&app_state, &user, referral_id, true).await?;

    let deleted = app_state.db_client
        .delete_referral(referral_id)
        .await
        .map_err(ServiceError::from)?;

    if !deleted {
        return Err(ServiceError::ReferralNotFound(referral_id).into());
    }

    Ok(Json(Response {
        status: "success",
        message: "Referral deleted".to_string(),
    }))
}
