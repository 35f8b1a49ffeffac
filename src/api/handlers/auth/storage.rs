//! Database helpers for one-time codes, identities and sessions.

use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{
    generate_password_placeholder, generate_session_token, hash_session_token,
    is_unique_violation, local_part,
};

pub(crate) const ROLE_ADMIN: &str = "admin";
pub(crate) const ROLE_USER: &str = "user";

const USER_COLUMNS: &str = "id, email, name, role, phone, profile_complete";

/// Identity row as seen by handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) role: String,
    pub(crate) phone: Option<String>,
    pub(crate) profile_complete: bool,
}

/// Minimal data returned for a valid session cookie.
#[derive(Clone, Debug)]
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) name: String,
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        role: row.get("role"),
        phone: row.get("phone"),
        profile_complete: row.get("profile_complete"),
    }
}

/// Remove every code for the address, used or not.
pub(super) async fn delete_codes(pool: &PgPool, email: &str) -> Result<u64> {
    let query = "DELETE FROM one_time_codes WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete one-time codes")?;
    Ok(result.rows_affected())
}

pub(super) async fn insert_code(
    pool: &PgPool,
    email: &str,
    code: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO one_time_codes (email, code, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert one-time code")?;
    Ok(())
}

/// Mark a matching, unused, unexpired code as used.
///
/// Lookup and mark happen in one statement, so two concurrent submissions of the
/// same code cannot both succeed.
pub(super) async fn consume_code(pool: &PgPool, email: &str, code: &str) -> Result<bool> {
    let query = r"
        UPDATE one_time_codes
        SET used = TRUE
        WHERE id = (
            SELECT id FROM one_time_codes
            WHERE email = $1
              AND code = $2
              AND used = FALSE
              AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
        )
          AND used = FALSE
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume one-time code")?;
    Ok(row.is_some())
}

pub(crate) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(user_from_row))
}

/// Create the identity and its empty cart, or return the existing identity when a
/// concurrent sign-in created it first.
pub(super) async fn provision_user(pool: &PgPool, email: &str) -> Result<UserRecord> {
    let mut tx = pool.begin().await.context("begin provisioning transaction")?;

    let query = format!(
        r"
        INSERT INTO users (email, name, role, password_hash, profile_complete)
        VALUES ($1, $2, $3, $4, FALSE)
        ON CONFLICT (email) DO NOTHING
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .bind(local_part(email))
        .bind(ROLE_USER)
        .bind(generate_password_placeholder()?)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert user")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return find_user_by_email(pool, email)
            .await?
            .ok_or_else(|| anyhow!("user vanished during provisioning"));
    };
    let user = user_from_row(&row);

    let query = "INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user.id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to create cart")?;

    tx.commit().await.context("commit provisioning transaction")?;

    Ok(user)
}

pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    // Store only the hash; the raw token goes back to the caller for the cookie.
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT users.id, users.email, users.name
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
    }))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Store a user-chosen display name. Marks the profile complete.
pub(super) async fn update_display_name(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
) -> Result<Option<UserRecord>> {
    let query = format!(
        r"
        UPDATE users
        SET name = $2, profile_complete = TRUE, updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(name)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update display name")?;
    Ok(row.as_ref().map(user_from_row))
}

enum DeleteKey {
    UserId,
    Email,
}

/// Delete the identity and everything that references it, in dependency order.
///
/// Returns `false` when the identity was already gone. Any failing step rolls the
/// whole deletion back.
pub(super) async fn delete_account(pool: &PgPool, user_id: Uuid, email: &str) -> Result<bool> {
    let steps = [
        (
            "DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)",
            DeleteKey::UserId,
            "failed to delete cart items",
        ),
        (
            "DELETE FROM carts WHERE user_id = $1",
            DeleteKey::UserId,
            "failed to delete cart",
        ),
        (
            "DELETE FROM order_items WHERE order_id IN (SELECT id FROM orders WHERE user_id = $1)",
            DeleteKey::UserId,
            "failed to delete order items",
        ),
        (
            "DELETE FROM orders WHERE user_id = $1",
            DeleteKey::UserId,
            "failed to delete orders",
        ),
        (
            "DELETE FROM one_time_codes WHERE email = $1",
            DeleteKey::Email,
            "failed to delete one-time codes",
        ),
        (
            "DELETE FROM user_sessions WHERE user_id = $1",
            DeleteKey::UserId,
            "failed to delete sessions",
        ),
    ];

    let mut tx = pool.begin().await.context("begin account deletion")?;

    for (query, key, context) in steps {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let statement = match key {
            DeleteKey::UserId => sqlx::query(query).bind(user_id),
            DeleteKey::Email => sqlx::query(query).bind(email),
        };
        let result = statement
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context(context)?;
        tracing::debug!(query, rows = result.rows_affected(), "account deletion step");
    }

    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete user")?;

    if result.rows_affected() == 0 {
        let _ = tx.rollback().await;
        return Ok(false);
    }

    tx.commit().await.context("commit account deletion")?;
    Ok(true)
}
