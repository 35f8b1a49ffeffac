//! Checkout and order history.
//!
//! Prices and totals are always derived from the stored menu; the client only
//! sends product ids and quantities.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{info, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;

use super::{
    auth::{principal::require_user, utils::local_part, AuthState},
    cart::{check_quantity, clear_cart},
    db_span, iso_column, parse_id,
};

const TAX_RATE: f64 = 0.05;
const FREE_DELIVERY_THRESHOLD: f64 = 299.0;
const DELIVERY_FEE: f64 = 30.0;
const PICKUP_ADDRESS: &str = "Pickup from store";
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Exact, case-sensitive match on the stored representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PREPARING" => Some(Self::Preparing),
            "OUT_FOR_DELIVERY" => Some(Self::OutForDelivery),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Delivery,
    Pickup,
}

impl DeliveryType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "delivery" => Some(Self::Delivery),
            "pickup" => Some(Self::Pickup),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Pickup => "pickup",
        }
    }

    /// Payment method assumed when the client sends none.
    fn default_payment_method(self) -> &'static str {
        match self {
            Self::Delivery => "cod",
            Self::Pickup => "counter",
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderItemInput {
    pub product_id: Option<String>,
    pub quantity: Option<i32>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Default, Clone)]
#[serde(default)]
pub struct AddressInput {
    pub flat: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemInput>,
    /// `delivery` or `pickup`.
    pub delivery_type: Option<String>,
    /// `cod` for delivery and `counter` for pickup when omitted.
    pub payment_method: Option<String>,
    /// Required for delivery.
    pub address: Option<AddressInput>,
    pub phone: Option<String>,
    pub special_instructions: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub message: String,
}

#[derive(Serialize, ToSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    /// `null` once the menu item has been deleted.
    pub product_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
}

#[derive(Serialize, ToSchema, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub delivery_type: DeliveryType,
    pub payment_method: String,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemView>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct OrdersResponse {
    pub orders: Vec<OrderView>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct OrderResponse {
    pub order: OrderView,
}

/// Order row joined with its owner.
#[derive(Clone, Debug)]
pub(crate) struct OrderRecord {
    pub(crate) order: OrderView,
    pub(crate) customer_name: String,
    pub(crate) customer_email: String,
}

/// Row filter for [`fetch_orders`]; empty means every order.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OrderFilter {
    pub(crate) owner: Option<Uuid>,
    pub(crate) id: Option<Uuid>,
    pub(crate) limit: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

/// Tax is 5% rounded to whole rupees; delivery is free from 299 and always
/// free for pickup.
#[must_use]
pub fn compute_totals(subtotal: f64, delivery_type: DeliveryType) -> OrderTotals {
    let tax = (subtotal * TAX_RATE).round();
    let delivery_fee = match delivery_type {
        DeliveryType::Pickup => 0.0,
        DeliveryType::Delivery if subtotal >= FREE_DELIVERY_THRESHOLD => 0.0,
        DeliveryType::Delivery => DELIVERY_FEE,
    };
    OrderTotals {
        subtotal,
        tax,
        delivery_fee,
        total: subtotal + tax + delivery_fee,
    }
}

fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `BP` + base36 epoch millis + 4 random base36 characters, all uppercase.
#[must_use]
pub fn generate_order_number() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect();
    format!("BP{}{suffix}", to_base36(millis))
}

/// Checked request, before pricing.
#[derive(Debug, PartialEq)]
struct OrderDraft {
    lines: Vec<(Uuid, i32)>,
    delivery_type: DeliveryType,
    payment_method: String,
    delivery_address: String,
    phone: String,
    notes: Option<String>,
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn format_address(address: &AddressInput) -> Option<String> {
    let flat = trimmed(address.flat.as_deref())?;
    let street = trimmed(address.street.as_deref())?;
    let city = trimmed(address.city.as_deref())?;
    let pincode = trimmed(address.pincode.as_deref())?;
    Some(format!("{flat}, {street}, {city} - {pincode}"))
}

fn validate(request: PlaceOrderRequest) -> Result<OrderDraft, ApiError> {
    if request.items.is_empty() {
        return Err(ApiError::InvalidInput("Cart is empty".to_string()));
    }
    let Some(phone) = trimmed(request.phone.as_deref()) else {
        return Err(ApiError::InvalidInput("Phone number is required".to_string()));
    };
    let Some(delivery_type) = request.delivery_type.as_deref().and_then(DeliveryType::parse) else {
        return Err(ApiError::InvalidInput(
            "Delivery type must be delivery or pickup".to_string(),
        ));
    };

    let delivery_address = match delivery_type {
        DeliveryType::Pickup => PICKUP_ADDRESS.to_string(),
        DeliveryType::Delivery => request
            .address
            .as_ref()
            .and_then(format_address)
            .ok_or_else(|| ApiError::InvalidInput("Delivery address is required".to_string()))?,
    };

    let mut lines = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let Some(product_id) = item.product_id.as_deref() else {
            return Err(ApiError::InvalidInput("Product ID is required".to_string()));
        };
        let quantity = check_quantity(item.quantity.unwrap_or(1))?;
        lines.push((parse_id(product_id, "product")?, quantity));
    }

    Ok(OrderDraft {
        lines,
        delivery_type,
        payment_method: trimmed(request.payment_method.as_deref())
            .unwrap_or_else(|| delivery_type.default_payment_method())
            .to_string(),
        delivery_address,
        phone: phone.to_string(),
        notes: trimmed(request.special_instructions.as_deref()).map(ToString::to_string),
    })
}

/// Snapshot each requested line at the current menu price.
fn price_lines(
    lines: &[(Uuid, i32)],
    menu: &HashMap<Uuid, (String, f64)>,
) -> Result<Vec<OrderItemView>, ApiError> {
    lines
        .iter()
        .map(|(product_id, quantity)| {
            let (name, price) = menu
                .get(product_id)
                .ok_or_else(|| ApiError::InvalidInput("Product not available".to_string()))?;
            Ok(OrderItemView {
                product_id: Some(product_id.to_string()),
                name: name.clone(),
                price: *price,
                quantity: *quantity,
            })
        })
        .collect()
}

async fn available_menu(pool: &PgPool, ids: &[Uuid]) -> Result<HashMap<Uuid, (String, f64)>> {
    let query = "SELECT id, name, price FROM products WHERE id = ANY($1) AND is_available = TRUE";
    let rows = sqlx::query(query)
        .bind(ids)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await
        .context("failed to load menu prices")?;
    Ok(rows
        .iter()
        .map(|row| (row.get("id"), (row.get("name"), row.get("price"))))
        .collect())
}

/// Insert the order with its lines and empty the caller's cart, all or nothing.
async fn insert_order(
    pool: &PgPool,
    user_id: Uuid,
    draft: &OrderDraft,
    items: &[OrderItemView],
    totals: OrderTotals,
) -> Result<(Uuid, String)> {
    let mut tx = pool.begin().await.context("begin order transaction")?;
    let order_number = generate_order_number();

    let query = r"
        INSERT INTO orders (
            order_number, user_id, status, subtotal, tax, delivery_fee, total_amount,
            delivery_type, payment_method, delivery_address, delivery_phone, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(&order_number)
        .bind(user_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(totals.subtotal)
        .bind(totals.tax)
        .bind(totals.delivery_fee)
        .bind(totals.total)
        .bind(draft.delivery_type.as_str())
        .bind(&draft.payment_method)
        .bind(&draft.delivery_address)
        .bind(&draft.phone)
        .bind(draft.notes.as_deref())
        .fetch_one(&mut *tx)
        .instrument(db_span("INSERT", query))
        .await
        .context("failed to insert order")?;
    let order_id: Uuid = row.get("id");

    let query = r"
        INSERT INTO order_items (order_id, product_id, name, price, quantity)
        VALUES ($1, $2, $3, $4, $5)
    ";
    for item in items {
        let product_id = item
            .product_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .context("priced line carries an invalid product id")?;
        sqlx::query(query)
            .bind(order_id)
            .bind(product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert order item")?;
    }

    clear_cart(&mut *tx, user_id).await?;

    tx.commit().await.context("commit order transaction")?;
    Ok((order_id, order_number))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed, cart emptied", body = PlaceOrderResponse),
        (status = 400, description = "Empty order, missing phone/address or unavailable product", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 500, description = "Order rolled back", body = crate::api::error::ErrorBody)
    ),
    tag = "orders"
)]
pub async fn place(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PlaceOrderRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let draft = validate(request)?;

    let ids: Vec<Uuid> = draft.lines.iter().map(|(id, _)| *id).collect();
    let menu = available_menu(&pool, &ids)
        .await
        .map_err(ApiError::storage("Failed to create order"))?;
    let items = price_lines(&draft.lines, &menu)?;

    let subtotal: f64 = items
        .iter()
        .map(|item| item.price * f64::from(item.quantity))
        .sum();
    let totals = compute_totals(subtotal, draft.delivery_type);

    let (order_id, order_number) = insert_order(&pool, user.id, &draft, &items, totals)
        .await
        .map_err(ApiError::storage("Failed to create order"))?;

    info!(user_id = %user.id, %order_number, total = totals.total, "order placed");

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            id: order_id.to_string(),
            order_number,
            status: OrderStatus::Pending,
            total_amount: totals.total,
            message: "Order placed successfully".to_string(),
        }),
    ))
}

fn order_from_row(row: &PgRow) -> Result<OrderRecord> {
    let status: String = row.get("status");
    let delivery_type: String = row.get("delivery_type");
    let customer_name: String = row.get("customer_name");
    let customer_email: String = row.get("customer_email");
    let customer_name = if customer_name.trim().is_empty() {
        local_part(&customer_email).to_string()
    } else {
        customer_name
    };

    Ok(OrderRecord {
        order: OrderView {
            id: row.get::<Uuid, _>("id").to_string(),
            order_number: row.get("order_number"),
            status: OrderStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown order status {status}"))?,
            subtotal: row.get("subtotal"),
            tax: row.get("tax"),
            delivery_fee: row.get("delivery_fee"),
            total_amount: row.get("total_amount"),
            delivery_type: DeliveryType::parse(&delivery_type)
                .ok_or_else(|| anyhow!("unknown delivery type {delivery_type}"))?,
            payment_method: row.get("payment_method"),
            delivery_address: row.get("delivery_address"),
            delivery_phone: row.get("delivery_phone"),
            notes: row.get("notes"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            items: Vec::new(),
        },
        customer_name,
        customer_email,
    })
}

/// Orders newest first, each with its lines.
pub(crate) async fn fetch_orders(pool: &PgPool, filter: OrderFilter) -> Result<Vec<OrderRecord>> {
    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
        r"
        SELECT o.id, o.order_number, o.status, o.subtotal, o.tax, o.delivery_fee,
               o.total_amount, o.delivery_type, o.payment_method, o.delivery_address,
               o.delivery_phone, o.notes, {}, {},
               u.name AS customer_name, u.email AS customer_email
        FROM orders o
        JOIN users u ON u.id = o.user_id
        WHERE TRUE",
        iso_column("o.created_at", "created_at"),
        iso_column("o.updated_at", "updated_at")
    ));
    if let Some(owner) = filter.owner {
        builder.push(" AND o.user_id = ").push_bind(owner);
    }
    if let Some(id) = filter.id {
        builder.push(" AND o.id = ").push_bind(id);
    }
    builder.push(" ORDER BY o.created_at DESC");
    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ").push_bind(limit);
    }

    let span = db_span("SELECT", builder.sql());
    let rows = builder
        .build()
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list orders")?;
    let mut records = rows.iter().map(order_from_row).collect::<Result<Vec<_>>>()?;
    if records.is_empty() {
        return Ok(records);
    }

    let ids = records
        .iter()
        .map(|record| Uuid::parse_str(&record.order.id))
        .collect::<Result<Vec<_>, _>>()
        .context("order id round-trip")?;
    let query = r"
        SELECT order_id, product_id, name, price, quantity
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY name
    ";
    let rows = sqlx::query(query)
        .bind(&ids)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await
        .context("failed to load order items")?;

    let mut items: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
    for row in &rows {
        items
            .entry(row.get("order_id"))
            .or_default()
            .push(OrderItemView {
                product_id: row
                    .get::<Option<Uuid>, _>("product_id")
                    .map(|id| id.to_string()),
                name: row.get("name"),
                price: row.get("price"),
                quantity: row.get("quantity"),
            });
    }
    for (record, id) in records.iter_mut().zip(&ids) {
        record.order.items = items.remove(id).unwrap_or_default();
    }
    Ok(records)
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Caller's orders, newest first", body = OrdersResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody)
    ),
    tag = "orders"
)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;

    let orders = fetch_orders(
        &pool,
        OrderFilter {
            owner: Some(user.id),
            ..OrderFilter::default()
        },
    )
    .await
    .map_err(ApiError::storage("Failed to fetch orders"))?;

    Ok(Json(OrdersResponse {
        orders: orders.into_iter().map(|record| record.order).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its lines", body = OrderResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 404, description = "No such order for the caller", body = crate::api::error::ErrorBody)
    ),
    tag = "orders"
)]
pub async fn get(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user = require_user(&headers, &pool, &auth_state).await?;
    let id = parse_id(&id, "order")?;

    let order = fetch_orders(
        &pool,
        OrderFilter {
            owner: Some(user.id),
            id: Some(id),
            limit: Some(1),
        },
    )
    .await
    .map_err(ApiError::storage("Failed to fetch order"))?
    .into_iter()
    .next()
    .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    Ok(Json(OrderResponse { order: order.order }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn address() -> AddressInput {
        AddressInput {
            flat: Some("12B".to_string()),
            street: Some("MG Road".to_string()),
            city: Some("Pune".to_string()),
            pincode: Some("411001".to_string()),
        }
    }

    fn request(delivery_type: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            items: vec![OrderItemInput {
                product_id: Some(Uuid::nil().to_string()),
                quantity: Some(2),
            }],
            delivery_type: Some(delivery_type.to_string()),
            payment_method: None,
            address: Some(address()),
            phone: Some("9999999999".to_string()),
            special_instructions: Some("  ".to_string()),
        }
    }

    fn message(result: Result<OrderDraft, ApiError>) -> Option<String> {
        result.err().map(|err| err.to_string())
    }

    #[test]
    fn totals_small_delivery_order_pays_fee() {
        let totals = compute_totals(198.0, DeliveryType::Delivery);
        assert_eq!(totals.tax, 10.0);
        assert_eq!(totals.delivery_fee, 30.0);
        assert_eq!(totals.total, 238.0);
    }

    #[test]
    fn totals_free_delivery_from_threshold() {
        let totals = compute_totals(299.0, DeliveryType::Delivery);
        assert_eq!(totals.tax, 15.0);
        assert_eq!(totals.delivery_fee, 0.0);
        assert_eq!(totals.total, 314.0);
    }

    #[test]
    fn totals_pickup_never_pays_fee() {
        let totals = compute_totals(99.0, DeliveryType::Pickup);
        assert_eq!(totals.tax, 5.0);
        assert_eq!(totals.delivery_fee, 0.0);
        assert_eq!(totals.total, 104.0);
    }

    #[test]
    fn status_parse_is_strict() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("pending"), None);
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn status_serializes_like_storage() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&OrderStatus::OutForDelivery)?,
            "\"OUT_FOR_DELIVERY\""
        );
        Ok(())
    }

    #[test]
    fn order_number_format() -> anyhow::Result<()> {
        let pattern = Regex::new(r"^BP[0-9A-Z]+$")?;
        let number = generate_order_number();
        assert!(pattern.is_match(&number), "unexpected order number {number}");
        assert!(number.len() > 6);
        Ok(())
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_295), "ZZ");
    }

    #[test]
    fn validate_delivery_order() {
        let draft = validate(request("delivery")).ok();
        assert_eq!(
            draft,
            Some(OrderDraft {
                lines: vec![(Uuid::nil(), 2)],
                delivery_type: DeliveryType::Delivery,
                payment_method: "cod".to_string(),
                delivery_address: "12B, MG Road, Pune - 411001".to_string(),
                phone: "9999999999".to_string(),
                notes: None,
            })
        );
    }

    #[test]
    fn validate_pickup_ignores_address() {
        let mut pickup = request("pickup");
        pickup.address = None;
        let draft = validate(pickup).ok();
        assert_eq!(
            draft.as_ref().map(|draft| draft.delivery_address.as_str()),
            Some(PICKUP_ADDRESS)
        );
        assert_eq!(
            draft.map(|draft| draft.payment_method),
            Some("counter".to_string())
        );
    }

    #[test]
    fn validate_rejects_incomplete_orders() {
        let mut empty = request("delivery");
        empty.items.clear();
        assert_eq!(message(validate(empty)), Some("Cart is empty".to_string()));

        let mut no_phone = request("delivery");
        no_phone.phone = Some(" ".to_string());
        assert_eq!(
            message(validate(no_phone)),
            Some("Phone number is required".to_string())
        );

        let mut no_address = request("delivery");
        no_address.address = None;
        assert_eq!(
            message(validate(no_address)),
            Some("Delivery address is required".to_string())
        );

        assert_eq!(
            message(validate(request("drone"))),
            Some("Delivery type must be delivery or pickup".to_string())
        );

        let mut zero = request("pickup");
        zero.items[0].quantity = Some(0);
        assert_eq!(
            message(validate(zero)),
            Some("Quantity must be at least 1".to_string())
        );

        let mut bulk = request("pickup");
        bulk.items[0].quantity = Some(i32::MAX);
        assert_eq!(
            message(validate(bulk)),
            Some("Quantity must be at most 99".to_string())
        );
    }

    #[test]
    fn pricing_uses_menu_snapshot() {
        let id = Uuid::new_v4();
        let menu = HashMap::from([(id, ("Misal Pav".to_string(), 120.0))]);
        let items = price_lines(&[(id, 3)], &menu).ok();
        assert_eq!(
            items,
            Some(vec![OrderItemView {
                product_id: Some(id.to_string()),
                name: "Misal Pav".to_string(),
                price: 120.0,
                quantity: 3,
            }])
        );

        let unknown = price_lines(&[(Uuid::new_v4(), 1)], &menu);
        assert_eq!(
            unknown.err().map(|err| err.to_string()),
            Some("Product not available".to_string())
        );
    }
}
