pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod cart;
pub(crate) mod health;
pub(crate) mod orders;
pub(crate) mod products;

use tracing::{info_span, Span};
use uuid::Uuid;

use crate::api::error::ApiError;

/// `to_char` pattern rendering timestamps as RFC 3339 UTC.
const ISO_TIMESTAMP: &str = r#"'YYYY-MM-DD"T"HH24:MI:SS.MS"Z"'"#;

/// Select expression for a timestamp column rendered as text, aliased to `alias`.
pub(crate) fn iso_column(column: &str, alias: &str) -> String {
    format!("to_char({column} AT TIME ZONE 'UTC', {ISO_TIMESTAMP}) AS {alias}")
}

pub(crate) fn db_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Parse a path/body identifier, mapping garbage to a 400.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::InvalidInput(format!("Invalid {what} id")))
}

// axum handler for root
pub async fn root() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
