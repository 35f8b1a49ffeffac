//! The caller's cart. Every statement is scoped to the caller's own cart.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{debug, Instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::error::ApiError;

use super::{
    auth::{principal::require_user, types::MessageResponse, AuthState},
    db_span, parse_id,
    products::find_product,
};

/// Largest quantity a single cart or order line may hold.
pub(crate) const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Serialize, ToSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub is_veg: bool,
    pub quantity: i32,
    pub total: f64,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: String,
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: f64,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct CartResponse {
    pub cart: CartView,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AddItemRequest {
    pub product_id: Option<String>,
    /// Defaults to 1, at most 99.
    pub quantity: Option<i32>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateItemRequest {
    pub item_id: Option<String>,
    /// Zero or less removes the line, at most 99.
    pub quantity: Option<i32>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RemoveItemQuery {
    pub item_id: Option<String>,
    /// `true` empties the whole cart.
    pub clear_all: Option<String>,
}

/// Total quantity and price sum over the lines.
fn summarize(items: &[CartLine]) -> (i64, f64) {
    items.iter().fold((0, 0.0), |(count, subtotal), item| {
        (count + i64::from(item.quantity), subtotal + item.total)
    })
}

/// The caller's cart id, creating the cart on first use.
pub(crate) async fn cart_id_for(pool: &PgPool, user_id: Uuid) -> Result<Uuid> {
    let query = r"
        INSERT INTO carts (user_id) VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(db_span("INSERT", query))
        .await
        .context("failed to get or create cart")?;
    Ok(row.get("id"))
}

async fn cart_lines(pool: &PgPool, cart_id: Uuid) -> Result<Vec<CartLine>> {
    let query = r"
        SELECT ci.id, ci.product_id, ci.quantity, p.name, p.price, p.image, p.is_veg
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY p.name
    ";
    let rows = sqlx::query(query)
        .bind(cart_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await
        .context("failed to load cart items")?;

    Ok(rows
        .iter()
        .map(|row| {
            let price: f64 = row.get("price");
            let quantity: i32 = row.get("quantity");
            CartLine {
                id: row.get::<Uuid, _>("id").to_string(),
                product_id: row.get::<Uuid, _>("product_id").to_string(),
                name: row.get("name"),
                price,
                image: row.get("image"),
                is_veg: row.get("is_veg"),
                quantity,
                total: price * f64::from(quantity),
            }
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart with line totals", body = CartResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "Identity no longer exists", body = crate::api::error::ErrorBody)
    ),
    tag = "cart"
)]
pub async fn view(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<CartResponse>, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    let cart_id = cart_id_for(&pool, user.id)
        .await
        .map_err(ApiError::storage("Failed to fetch cart"))?;
    let items = cart_lines(&pool, cart_id)
        .await
        .map_err(ApiError::storage("Failed to fetch cart"))?;
    let (item_count, subtotal) = summarize(&items);

    Ok(Json(CartResponse {
        cart: CartView {
            id: cart_id.to_string(),
            items,
            item_count,
            subtotal,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "Item added or quantity increased", body = MessageResponse),
        (status = 400, description = "Missing product or bad quantity", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "Product not available", body = crate::api::error::ErrorBody)
    ),
    tag = "cart"
)]
pub async fn add_item(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<AddItemRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let Some(product_id) = request.product_id.as_deref() else {
        return Err(ApiError::InvalidInput("Product ID is required".to_string()));
    };
    let product_id = parse_id(product_id, "product")?;
    let quantity = check_quantity(request.quantity.unwrap_or(1))?;

    let available = find_product(&pool, product_id)
        .await
        .map_err(ApiError::storage("Failed to add item"))?
        .is_some_and(|product| product.is_available);
    if !available {
        return Err(ApiError::NotFound("Product not available".to_string()));
    }

    let cart_id = cart_id_for(&pool, user.id)
        .await
        .map_err(ApiError::storage("Failed to add item"))?;

    add_line(&*pool, cart_id, product_id, quantity)
        .await
        .map_err(ApiError::storage("Failed to add item"))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Item added to cart".to_string(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/cart",
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Quantity changed or line removed", body = MessageResponse),
        (status = 400, description = "Missing item id or quantity", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such line in the caller's cart", body = crate::api::error::ErrorBody)
    ),
    tag = "cart"
)]
pub async fn update_item(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateItemRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let (Some(item_id), Some(quantity)) = (request.item_id.as_deref(), request.quantity) else {
        return Err(ApiError::InvalidInput(
            "Item ID and quantity are required".to_string(),
        ));
    };
    let item_id = parse_id(item_id, "item")?;

    if quantity <= 0 {
        if !delete_line(&pool, user.id, item_id)
            .await
            .map_err(ApiError::storage("Failed to update cart"))?
        {
            return Err(ApiError::NotFound("Cart item not found".to_string()));
        }
        return Ok(Json(MessageResponse {
            message: "Item removed from cart".to_string(),
        }));
    }
    let quantity = check_quantity(quantity)?;

    let query = r"
        UPDATE cart_items SET quantity = $1
        WHERE id = $2
          AND cart_id IN (SELECT id FROM carts WHERE user_id = $3)
    ";
    let result = sqlx::query(query)
        .bind(quantity)
        .bind(item_id)
        .bind(user.id)
        .execute(&*pool)
        .instrument(db_span("UPDATE", query))
        .await
        .map_err(|err| ApiError::storage("Failed to update cart")(err.into()))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Cart item not found".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Cart updated".to_string(),
    }))
}

/// Insert a line or grow an existing one, saturating at [`MAX_LINE_QUANTITY`].
pub(crate) async fn add_line<'e, E>(
    executor: E,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let query = r"
        INSERT INTO cart_items (cart_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (cart_id, product_id)
        DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $4)
    ";
    sqlx::query(query)
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .execute(executor)
        .instrument(db_span("INSERT", query))
        .await
        .context("failed to add cart item")?;
    Ok(())
}

/// Accept a line quantity between 1 and [`MAX_LINE_QUANTITY`].
pub(crate) fn check_quantity(quantity: i32) -> Result<i32, ApiError> {
    if quantity < 1 {
        return Err(ApiError::InvalidInput(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(ApiError::InvalidInput(format!(
            "Quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(quantity)
}

async fn delete_line(pool: &PgPool, user_id: Uuid, item_id: Uuid) -> Result<bool> {
    let query = r"
        DELETE FROM cart_items
        WHERE id = $1
          AND cart_id IN (SELECT id FROM carts WHERE user_id = $2)
    ";
    let result = sqlx::query(query)
        .bind(item_id)
        .bind(user_id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await
        .context("failed to delete cart item")?;
    Ok(result.rows_affected() > 0)
}

/// Empty the caller's cart; returns the number of removed lines.
pub(crate) async fn clear_cart<'e, E>(executor: E, user_id: Uuid) -> Result<u64>
where
    E: sqlx::PgExecutor<'e>,
{
    let query = r"
        DELETE FROM cart_items
        WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)
    ";
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(executor)
        .instrument(db_span("DELETE", query))
        .await
        .context("failed to clear cart")?;
    Ok(result.rows_affected())
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    params(RemoveItemQuery),
    responses(
        (status = 200, description = "Line removed or cart cleared", body = MessageResponse),
        (status = 400, description = "Missing item id", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such line in the caller's cart", body = crate::api::error::ErrorBody)
    ),
    tag = "cart"
)]
pub async fn remove_item(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(params): Query<RemoveItemQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    if params.clear_all.as_deref() == Some("true") {
        let removed = clear_cart(&*pool, user.id)
            .await
            .map_err(ApiError::storage("Failed to remove item"))?;
        debug!(user_id = %user.id, removed, "cart cleared");
        return Ok(Json(MessageResponse {
            message: "Cart cleared".to_string(),
        }));
    }

    let Some(item_id) = params.item_id.as_deref() else {
        return Err(ApiError::InvalidInput("Item ID is required".to_string()));
    };
    let item_id = parse_id(item_id, "item")?;

    if !delete_line(&pool, user.id, item_id)
        .await
        .map_err(ApiError::storage("Failed to remove item"))?
    {
        return Err(ApiError::NotFound("Cart item not found".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Item removed from cart".to_string(),
    }))
}
