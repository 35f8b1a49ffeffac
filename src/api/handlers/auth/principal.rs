//! Current-identity resolution and authorization helpers.
//!
//! Flow Overview: every protected handler asks [`resolve_current_user`] who is
//! calling. The resolver chain tries the session cookie first, then an
//! `Authorization: Bearer` token. Both yield the same [`CurrentUser`], so handlers
//! never care which channel authenticated the request. A token that is missing,
//! malformed, tampered or expired resolves to "no identity", never to an error.

use async_trait::async_trait;
use axum::http::HeaderMap;
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use crate::api::error::ApiError;

use super::{
    session::{extract_bearer_token, extract_session_token},
    state::AuthState,
    storage::{find_user_by_id, lookup_session, UserRecord, ROLE_ADMIN},
    token::TokenSigner,
    utils::{hash_session_token, now_unix_seconds},
};

/// Authenticated caller, regardless of channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<&CurrentUser> for super::types::UserSummary {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// One way of proving identity on a request.
#[async_trait]
pub(crate) trait CredentialResolver: Send + Sync {
    fn channel(&self) -> &'static str;

    /// `Ok(None)` when this channel carries no valid credential.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<CurrentUser>, ApiError>;
}

/// Server-side session referenced by the session cookie.
pub(crate) struct SessionResolver<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionResolver<'a> {
    pub(crate) fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialResolver for SessionResolver<'_> {
    fn channel(&self) -> &'static str {
        "session"
    }

    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<CurrentUser>, ApiError> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        // Only the hash is stored; never compare raw tokens against the database.
        let token_hash = hash_session_token(&token);
        let record = lookup_session(self.pool, &token_hash)
            .await
            .map_err(ApiError::storage("Failed to resolve session"))?;
        Ok(record.map(|record| CurrentUser {
            id: record.user_id,
            email: record.email,
            name: record.name,
        }))
    }
}

/// Signed bearer token from the mobile channel.
pub(crate) struct BearerResolver<'a> {
    signer: &'a TokenSigner,
}

impl<'a> BearerResolver<'a> {
    pub(crate) fn new(signer: &'a TokenSigner) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl CredentialResolver for BearerResolver<'_> {
    fn channel(&self) -> &'static str {
        "bearer"
    }

    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<CurrentUser>, ApiError> {
        let Some(token) = extract_bearer_token(headers) else {
            return Ok(None);
        };
        let claims = match self.signer.verify(&token, now_unix_seconds()) {
            Ok(claims) => claims,
            Err(err) => {
                debug!("Ignoring bearer token: {err}");
                return Ok(None);
            }
        };
        let Ok(id) = Uuid::parse_str(&claims.id) else {
            debug!("Ignoring bearer token: subject is not a UUID");
            return Ok(None);
        };
        Ok(Some(CurrentUser {
            id,
            email: claims.email,
            name: claims.name,
        }))
    }
}

/// First identity produced by the resolvers, in order.
pub(crate) async fn resolve_with(
    resolvers: &[&dyn CredentialResolver],
    headers: &HeaderMap,
) -> Result<Option<CurrentUser>, ApiError> {
    for resolver in resolvers {
        if let Some(user) = resolver.resolve(headers).await? {
            debug!(channel = resolver.channel(), "request authenticated");
            return Ok(Some(user));
        }
    }
    Ok(None)
}

/// Resolve the caller: session cookie first, then bearer token.
pub(crate) async fn resolve_current_user(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Option<CurrentUser>, ApiError> {
    let session = SessionResolver::new(pool);
    let bearer = BearerResolver::new(auth_state.signer());
    let resolvers: [&dyn CredentialResolver; 2] = [&session, &bearer];
    resolve_with(&resolvers, headers).await
}

/// Resolve the caller or return 401.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<CurrentUser, ApiError> {
    resolve_current_user(headers, pool, auth_state)
        .await?
        .ok_or(ApiError::Unauthenticated)
}

/// Resolve the caller and load the stored identity.
///
/// A valid token can outlive its identity; that case is `NotFound`.
pub(crate) async fn require_user(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<UserRecord, ApiError> {
    let current = require_auth(headers, pool, auth_state).await?;
    find_user_by_id(pool, current.id)
        .await
        .map_err(ApiError::storage("Failed to load user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// True only for a present identity with the admin role.
pub(crate) fn is_admin(user: Option<&UserRecord>) -> bool {
    user.is_some_and(|user| user.role == ROLE_ADMIN)
}

/// Gate for admin-only operations: 401 without an identity, 403 for non-admins.
pub(crate) async fn require_admin(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<UserRecord, ApiError> {
    let current = require_auth(headers, pool, auth_state).await?;
    let user = find_user_by_id(pool, current.id)
        .await
        .map_err(ApiError::storage("Failed to load user"))?;
    match user {
        None => Err(ApiError::Unauthenticated),
        Some(user) if is_admin(Some(&user)) => Ok(user),
        Some(_) => Err(ApiError::Forbidden),
    }
}

/// Admin status of the caller. Lookup failures count as "not admin".
pub(crate) async fn admin_status(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> bool {
    let current = match resolve_current_user(headers, pool, auth_state).await {
        Ok(Some(current)) => current,
        Ok(None) => return false,
        Err(err) => {
            error!("Admin check failed: {err}");
            return false;
        }
    };
    match find_user_by_id(pool, current.id).await {
        Ok(user) => is_admin(user.as_ref()),
        Err(err) => {
            error!("Admin check failed: {err:#}");
            false
        }
    }
}
