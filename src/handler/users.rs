use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Extension, Json, Router};

use crate::{
    dtos::{FilterUserDto, Response, UserData, UserResponseDto},
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn users_handler() -> Router {
    Router::new().route("/me", get(get_me).delete(delete_me))
}

pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let response_data = UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user.user),
        },
    };

    Ok(Json(response_data))
}

/// Referrals made by the user stay behind; the reward jobs keep
/// evaluating them.
pub async fn delete_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let deleted = app_state.db_client
        .delete_user(user.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if !deleted {
        return Err(HttpError::not_found(ErrorMessage::UserNoLongerExist.to_string()));
    }

    tracing::info!(user_id = %user.user.id, "User deleted");

    Ok(Json(Response {
        status: "success",
        message: "User deleted".to_string(),
    }))
}
