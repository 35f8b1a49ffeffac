//! Profile name update and account deletion for the signed-in caller.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;

use super::{
    principal::{require_auth, require_user},
    session::clear_session_cookie,
    state::AuthState,
    storage,
    types::{MessageResponse, UpdateNameRequest, UpdateNameResponse, UserSummary},
};

#[utoipa::path(
    post,
    path = "/api/auth/update-name",
    request_body = UpdateNameRequest,
    responses(
        (status = 200, description = "Name stored", body = UpdateNameResponse),
        (status = 400, description = "Missing name", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "Identity no longer exists", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn update_name(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateNameRequest>>,
) -> Result<Json<UpdateNameResponse>, ApiError> {
    let current = require_auth(&headers, &pool, &auth_state).await?;

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let name = request.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("Name is required".to_string()));
    }

    let user = storage::update_display_name(&pool, current.id, name)
        .await
        .map_err(ApiError::storage("Failed to update name"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UpdateNameResponse {
        message: "Name updated successfully".to_string(),
        user: UserSummary::from(&user),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/auth/delete-account",
    responses(
        (status = 200, description = "Account and all dependent records removed", body = MessageResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "Identity no longer exists", body = crate::api::error::ErrorBody),
        (status = 500, description = "Deletion rolled back", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn delete_account(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    let deleted = storage::delete_account(&pool, user.id, &user.email)
        .await
        .map_err(ApiError::storage("Failed to delete account"))?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id = %user.id, "account deleted");

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    Ok((
        StatusCode::OK,
        response_headers,
        Json(MessageResponse {
            message: "Account deleted successfully".to_string(),
        }),
    ))
}
