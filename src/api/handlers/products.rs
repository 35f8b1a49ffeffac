//! Menu catalog: public listing plus admin-only maintenance.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use std::sync::Arc;
use tracing::{info, Instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::error::ApiError;

use super::{
    auth::{principal::require_admin, types::MessageResponse, AuthState},
    db_span, iso_column, parse_id,
};

#[derive(Serialize, ToSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub category: String,
    pub is_veg: bool,
    pub is_best_seller: bool,
    pub is_trending: bool,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ProductResponse {
    pub product: Product,
}

/// Listing filters. Flags only narrow the result when set to `true`.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    /// `true` or `false`; anything else is ignored.
    pub is_veg: Option<String>,
    pub best_sellers: Option<String>,
    pub trending: Option<String>,
}

/// Create/update payload. On update, absent fields keep their stored value.
#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub is_veg: Option<bool>,
    pub is_best_seller: Option<bool>,
    pub is_trending: Option<bool>,
    pub is_available: Option<bool>,
}

fn product_columns() -> String {
    format!(
        "id, name, description, price, image, category, is_veg, is_best_seller, is_trending, \
         is_available, {}, {}",
        iso_column("created_at", "created_at"),
        iso_column("updated_at", "updated_at")
    )
}

fn product_from_row(row: &PgRow) -> Product {
    Product {
        id: row.get::<Uuid, _>("id").to_string(),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        image: row.get("image"),
        category: row.get("category"),
        is_veg: row.get("is_veg"),
        is_best_seller: row.get("is_best_seller"),
        is_trending: row.get("is_trending"),
        is_available: row.get("is_available"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Escape `LIKE` metacharacters so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Trimmed, non-empty text or `None`.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn list_query(filter: &ProductFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM products WHERE is_available = TRUE",
        product_columns()
    ));

    if let Some(category) = non_empty(filter.category.as_deref()) {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(search) = non_empty(filter.search.as_deref()) {
        let pattern = format!("%{}%", escape_like(&search));
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(is_veg) = parse_flag(filter.is_veg.as_deref()) {
        builder.push(" AND is_veg = ").push_bind(is_veg);
    }
    if parse_flag(filter.best_sellers.as_deref()) == Some(true) {
        builder.push(" AND is_best_seller = TRUE");
    }
    if parse_flag(filter.trending.as_deref()) == Some(true) {
        builder.push(" AND is_trending = TRUE");
    }
    builder.push(" ORDER BY created_at DESC");
    builder
}

async fn list_products(pool: &PgPool, filter: &ProductFilter) -> Result<Vec<Product>> {
    let mut builder = list_query(filter);
    let span = db_span("SELECT", builder.sql());
    let rows = builder
        .build()
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list products")?;
    Ok(rows.iter().map(product_from_row).collect())
}

pub(crate) async fn find_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>> {
    let query = format!("SELECT {} FROM products WHERE id = $1", product_columns());
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await
        .context("failed to load product")?;
    Ok(row.as_ref().map(product_from_row))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Available menu items, newest first", body = ProductsResponse),
        (status = 500, description = "Storage failure", body = crate::api::error::ErrorBody)
    ),
    tag = "products"
)]
pub async fn list(
    pool: Extension<PgPool>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ProductsResponse>, ApiError> {
    let products = list_products(&pool, &filter)
        .await
        .map_err(ApiError::storage("Failed to fetch products"))?;
    Ok(Json(ProductsResponse { products }))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Menu item", body = ProductResponse),
        (status = 400, description = "Malformed id", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown product", body = crate::api::error::ErrorBody)
    ),
    tag = "products"
)]
pub async fn get(
    pool: Extension<PgPool>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id = parse_id(&id, "product")?;
    let product = find_product(&pool, id)
        .await
        .map_err(ApiError::storage("Failed to fetch product"))?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(ProductResponse { product }))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Menu item created", body = ProductResponse),
        (status = 400, description = "Missing name, price or category", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody)
    ),
    tag = "products"
)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ProductInput>>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers, &pool, &auth_state).await?;

    let input = payload.map(|Json(input)| input).unwrap_or_default();
    let name = non_empty(input.name.as_deref());
    let category = non_empty(input.category.as_deref());
    let (Some(name), Some(price), Some(category)) =
        (name, input.price.filter(|price| valid_price(*price)), category)
    else {
        return Err(ApiError::InvalidInput(
            "Name, price, and category are required".to_string(),
        ));
    };

    let query = format!(
        r"
        INSERT INTO products
            (name, description, price, image, category, is_veg, is_best_seller, is_trending, is_available)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
    ",
        product_columns()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(input.description.unwrap_or_default())
        .bind(price)
        .bind(input.image.unwrap_or_default())
        .bind(category)
        .bind(input.is_veg.unwrap_or(true))
        .bind(input.is_best_seller.unwrap_or(false))
        .bind(input.is_trending.unwrap_or(false))
        .bind(input.is_available.unwrap_or(true))
        .fetch_one(&*pool)
        .instrument(db_span("INSERT", &query))
        .await
        .map_err(|err| ApiError::storage("Failed to create product")(err.into()))?;

    let product = product_from_row(&row);
    info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(ProductResponse { product })))
}

/// Partial update; `None` when the product does not exist.
async fn update_product(pool: &PgPool, id: Uuid, input: ProductInput) -> Result<Option<Product>> {
    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("UPDATE products SET updated_at = NOW()");
    if let Some(name) = input.name {
        builder.push(", name = ").push_bind(name.trim().to_string());
    }
    if let Some(description) = input.description {
        builder.push(", description = ").push_bind(description);
    }
    if let Some(price) = input.price {
        builder.push(", price = ").push_bind(price);
    }
    if let Some(image) = input.image {
        builder.push(", image = ").push_bind(image);
    }
    if let Some(category) = input.category {
        builder.push(", category = ").push_bind(category.trim().to_string());
    }
    if let Some(is_veg) = input.is_veg {
        builder.push(", is_veg = ").push_bind(is_veg);
    }
    if let Some(is_best_seller) = input.is_best_seller {
        builder.push(", is_best_seller = ").push_bind(is_best_seller);
    }
    if let Some(is_trending) = input.is_trending {
        builder.push(", is_trending = ").push_bind(is_trending);
    }
    if let Some(is_available) = input.is_available {
        builder.push(", is_available = ").push_bind(is_available);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(product_columns());

    let span = db_span("UPDATE", builder.sql());
    let row = builder
        .build()
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update product")?;
    Ok(row.as_ref().map(product_from_row))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Menu item updated", body = ProductResponse),
        (status = 400, description = "Invalid field value", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown product", body = crate::api::error::ErrorBody)
    ),
    tag = "products"
)]
pub async fn update(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<ProductInput>>,
) -> Result<Json<ProductResponse>, ApiError> {
    require_admin(&headers, &pool, &auth_state).await?;
    let id = parse_id(&id, "product")?;

    let input = payload.map(|Json(input)| input).unwrap_or_default();
    if input.price.is_some_and(|price| !valid_price(price)) {
        return Err(ApiError::InvalidInput("Price must be greater than zero".to_string()));
    }
    if input.name.as_deref().is_some_and(|name| name.trim().is_empty())
        || input
            .category
            .as_deref()
            .is_some_and(|category| category.trim().is_empty())
    {
        return Err(ApiError::InvalidInput(
            "Name and category cannot be empty".to_string(),
        ));
    }

    let product = update_product(&pool, id, input)
        .await
        .map_err(ApiError::storage("Failed to update product"))?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(ProductResponse { product }))
}

/// Remove the product and any cart lines pointing at it. Order lines keep
/// their name/price snapshot and lose the reference.
async fn delete_product(pool: &PgPool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin product deletion")?;

    let query = "DELETE FROM cart_items WHERE product_id = $1";
    sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(db_span("DELETE", query))
        .await
        .context("failed to delete cart items for product")?;

    let query = "DELETE FROM products WHERE id = $1";
    let result = sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(db_span("DELETE", query))
        .await
        .context("failed to delete product")?;

    if result.rows_affected() == 0 {
        tx.rollback().await.context("rollback product deletion")?;
        return Ok(false);
    }
    tx.commit().await.context("commit product deletion")?;
    Ok(true)
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Menu item removed", body = MessageResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown product", body = crate::api::error::ErrorBody)
    ),
    tag = "products"
)]
pub async fn remove(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_admin(&headers, &pool, &auth_state).await?;
    let id = parse_id(&id, "product")?;

    if !delete_product(&pool, id)
        .await
        .map_err(ApiError::storage("Failed to delete product"))?
    {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    info!(product_id = %id, "product deleted");
    Ok(Json(MessageResponse {
        message: "Product deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("paneer"), "paneer");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn flags_parse_strictly() {
        assert_eq!(parse_flag(Some("true")), Some(true));
        assert_eq!(parse_flag(Some("false")), Some(false));
        assert_eq!(parse_flag(Some("yes")), None);
        assert_eq!(parse_flag(None), None);
    }

    #[test]
    fn price_must_be_positive() {
        assert!(valid_price(99.0));
        assert!(!valid_price(0.0));
        assert!(!valid_price(-1.0));
        assert!(!valid_price(f64::NAN));
    }

    #[test]
    fn list_query_without_filters_only_shows_available() {
        let builder = list_query(&ProductFilter::default());
        let sql = builder.sql();
        assert!(sql.contains("WHERE is_available = TRUE"));
        assert!(sql.ends_with("ORDER BY created_at DESC"));
        assert!(!sql.contains("$1"));
    }

    #[test]
    fn list_query_binds_each_filter() {
        let filter = ProductFilter {
            category: Some("rolls".to_string()),
            search: Some("Paneer".to_string()),
            is_veg: Some("false".to_string()),
            best_sellers: Some("true".to_string()),
            trending: Some("nope".to_string()),
        };
        let builder = list_query(&filter);
        let sql = builder.sql();
        assert!(sql.contains("category = $1"));
        assert!(sql.contains("name ILIKE $2 OR description ILIKE $3"));
        assert!(sql.contains("is_veg = $4"));
        assert!(sql.contains("is_best_seller = TRUE"));
        assert!(!sql.contains("is_trending = TRUE"));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = ProductFilter {
            category: Some("  ".to_string()),
            search: Some(String::new()),
            ..ProductFilter::default()
        };
        assert!(!list_query(&filter).sql().contains("$1"));
    }
}
