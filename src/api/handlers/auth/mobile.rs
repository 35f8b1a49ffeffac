//! Mobile sign-in: verify the code inline and hand back a bearer token.

use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::error::ApiError;

use super::{
    otp::{verify_code, IdentityPolicy},
    state::AuthState,
    types::{CodeRequest, MobileLoginResponse, MobileUser},
    utils::now_unix_seconds,
};

#[utoipa::path(
    post,
    path = "/api/auth/mobile-login",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Code accepted; bearer token issued", body = MobileLoginResponse),
        (status = 400, description = "Missing fields or invalid/expired code", body = crate::api::error::ErrorBody),
        (status = 404, description = "No identity for this address", body = crate::api::error::ErrorBody),
        (status = 500, description = "Storage failure", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn mobile_login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CodeRequest>>,
) -> Result<Json<MobileLoginResponse>, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let verified = verify_code(
        &pool,
        request.email.as_deref(),
        request.otp.as_deref(),
        IdentityPolicy::ExistingOnly,
    )
    .await?;
    let user = verified.user;

    let token = auth_state
        .signer()
        .issue(user.id, &user.email, &user.name, now_unix_seconds())
        .map_err(|err| ApiError::storage("Login failed")(anyhow::Error::new(err)))?;

    Ok(Json(MobileLoginResponse {
        token,
        user: MobileUser {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
        },
    }))
}
