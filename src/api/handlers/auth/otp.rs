//! One-time code issuance and verification.
//!
//! Flow Overview:
//! 1) `send-otp`: validate the address, delete older codes, store a new 6-digit
//!    code with a 10 minute expiry, then mail it.
//! 2) `verify-otp`: consume the code atomically, find or provision the identity,
//!    delete leftover codes, then bind a session cookie.
//!
//! Verification failures never say whether the code was wrong, expired or
//! already used.

use anyhow::anyhow;
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{error::ApiError, mail::otp_message};

use super::{
    session::session_cookie,
    state::AuthState,
    storage::{self, UserRecord},
    types::{CodeRequest, SendCodeRequest, SendCodeResponse, UserSummary, VerifyCodeResponse},
    utils::{generate_otp_code, normalize_email, valid_email},
};

/// What to do when a verified address has no identity yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IdentityPolicy {
    /// Provision the identity and its empty cart.
    Register,
    /// Fail with `NotFound`; the caller must register through the web flow first.
    ExistingOnly,
}

#[derive(Debug)]
pub(crate) struct Verified {
    pub(crate) user: UserRecord,
    pub(crate) is_new_identity: bool,
}

/// Issue a fresh code for the address and mail it.
///
/// Returns the normalized address. The code stays stored if mailing fails.
pub(crate) async fn issue_code(
    pool: &PgPool,
    auth_state: &AuthState,
    email: Option<&str>,
) -> Result<String, ApiError> {
    let email = email.map(normalize_email).unwrap_or_default();
    if email.is_empty() || !valid_email(&email) {
        return Err(ApiError::InvalidInput("Valid email is required".to_string()));
    }

    let code = generate_otp_code();
    let ttl_seconds = auth_state.config().otp_ttl_seconds();

    // Best-effort: a stale code left behind still expires on its own.
    if let Err(err) = storage::delete_codes(pool, &email).await {
        warn!("Failed to delete previous codes: {err:#}");
    }

    storage::insert_code(pool, &email, &code, ttl_seconds)
        .await
        .map_err(ApiError::storage("Failed to store OTP"))?;

    let message = otp_message(&email, &code, ttl_seconds / 60);
    auth_state
        .mailer()
        .send(&message)
        .await
        .map_err(|err| ApiError::DependencyFailure(format!("{err:#}")))?;

    info!("OTP issued");

    Ok(email)
}

/// Check (address, code) and resolve the identity according to `policy`.
pub(crate) async fn verify_code(
    pool: &PgPool,
    email: Option<&str>,
    code: Option<&str>,
    policy: IdentityPolicy,
) -> Result<Verified, ApiError> {
    let email = email.map(normalize_email).unwrap_or_default();
    let code = code.map(str::trim).unwrap_or_default();
    if email.is_empty() || code.is_empty() {
        return Err(ApiError::InvalidInput("Email and OTP are required".to_string()));
    }

    let user = match policy {
        IdentityPolicy::Register => {
            consume(pool, &email, code).await?;
            match storage::find_user_by_email(pool, &email)
                .await
                .map_err(ApiError::storage("Failed to verify OTP"))?
            {
                Some(user) => user,
                None => storage::provision_user(pool, &email)
                    .await
                    .map_err(ApiError::storage("Failed to create user"))?,
            }
        }
        IdentityPolicy::ExistingOnly => {
            // Look the identity up first so an unknown address never burns a code.
            let user = storage::find_user_by_email(pool, &email)
                .await
                .map_err(ApiError::storage("Login failed"))?
                .ok_or_else(|| {
                    ApiError::NotFound("User not found. Please register first.".to_string())
                })?;
            consume(pool, &email, code).await?;
            user
        }
    };

    if let Err(err) = storage::delete_codes(pool, &email).await {
        warn!("Failed to clean up codes after verification: {err:#}");
    }

    Ok(Verified {
        is_new_identity: !user.profile_complete,
        user,
    })
}

async fn consume(pool: &PgPool, email: &str, code: &str) -> Result<(), ApiError> {
    let consumed = storage::consume_code(pool, email, code)
        .await
        .map_err(ApiError::storage("Failed to verify OTP"))?;
    if consumed {
        Ok(())
    } else {
        Err(ApiError::InvalidCredential)
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/send-otp",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code stored and mailed", body = SendCodeResponse),
        (status = 400, description = "Missing or malformed email", body = crate::api::error::ErrorBody),
        (status = 500, description = "Storage or mail failure", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn send_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SendCodeRequest>>,
) -> Result<Json<SendCodeResponse>, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let email = issue_code(&pool, &auth_state, request.email.as_deref()).await?;

    Ok(Json(SendCodeResponse {
        message: "OTP sent successfully".to_string(),
        email,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Code accepted; session cookie set", body = VerifyCodeResponse),
        (status = 400, description = "Missing fields or invalid/expired code", body = crate::api::error::ErrorBody),
        (status = 500, description = "Storage failure", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CodeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let verified = verify_code(
        &pool,
        request.email.as_deref(),
        request.otp.as_deref(),
        IdentityPolicy::Register,
    )
    .await?;

    // The verified identity goes straight to the session binder; nothing the
    // client sends afterwards can claim a verification.
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    let token = storage::insert_session(&pool, verified.user.id, ttl_seconds)
        .await
        .map_err(ApiError::storage("Failed to create session"))?;
    let cookie = session_cookie(&auth_state, &token)
        .map_err(|err| ApiError::storage("Failed to create session")(anyhow!(err)))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    let body = VerifyCodeResponse {
        message: "OTP verified successfully".to_string(),
        is_new_user: verified.is_new_identity,
        user: UserSummary::from(&verified.user),
    };

    Ok((StatusCode::OK, headers, Json(body)))
}
