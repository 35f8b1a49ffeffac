//! Admin console: role check, dashboard numbers and order management.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{info, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;

use super::{
    auth::{
        principal::{admin_status, require_admin},
        AuthState,
    },
    db_span,
    orders::{fetch_orders, OrderFilter, OrderRecord, OrderStatus, OrderView},
    parse_id,
};

const RECENT_ORDERS: i64 = 5;

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckResponse {
    pub is_admin: bool,
}

#[derive(Serialize, ToSchema, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Sum over every order that was not cancelled.
    pub total_revenue: f64,
    pub total_products: i64,
    pub total_users: i64,
    /// Orders since UTC midnight.
    pub today_orders: i64,
}

/// Order as shown in the console, with its customer.
#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub order: OrderView,
    /// Display name, or the email local part when the name is blank.
    pub customer_name: String,
    pub customer_email: String,
}

impl From<OrderRecord> for AdminOrderView {
    fn from(record: OrderRecord) -> Self {
        Self {
            order: record.order,
            customer_name: record.customer_name,
            customer_email: record.customer_email,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub stats: DashboardStats,
    pub recent_orders: Vec<AdminOrderView>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct AdminOrdersResponse {
    pub orders: Vec<AdminOrderView>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct AdminOrderResponse {
    pub order: AdminOrderView,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(default)]
pub struct UpdateStatusRequest {
    /// One of `PENDING`, `CONFIRMED`, `PREPARING`, `OUT_FOR_DELIVERY`,
    /// `DELIVERED`, `CANCELLED`.
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/admin/check",
    responses(
        (status = 200, description = "Whether the caller is an admin; never fails", body = AdminCheckResponse)
    ),
    tag = "admin"
)]
pub async fn check(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Json<AdminCheckResponse> {
    Json(AdminCheckResponse {
        is_admin: admin_status(&headers, &pool, &auth_state).await,
    })
}

async fn dashboard_stats(pool: &PgPool) -> Result<DashboardStats> {
    let query = r"
        SELECT
            (SELECT COUNT(*) FROM orders) AS total_orders,
            (SELECT COUNT(*) FROM orders WHERE status = 'PENDING') AS pending_orders,
            (SELECT COALESCE(SUM(total_amount), 0)::DOUBLE PRECISION
               FROM orders WHERE status <> 'CANCELLED') AS total_revenue,
            (SELECT COUNT(*) FROM products) AS total_products,
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM orders
               WHERE created_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'
            ) AS today_orders
    ";
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(db_span("SELECT", query))
        .await
        .context("failed to compute dashboard stats")?;

    Ok(DashboardStats {
        total_orders: row.get("total_orders"),
        pending_orders: row.get("pending_orders"),
        total_revenue: row.get("total_revenue"),
        total_products: row.get("total_products"),
        total_users: row.get("total_users"),
        today_orders: row.get("today_orders"),
    })
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Dashboard counters and the latest orders", body = StatsResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody)
    ),
    tag = "admin"
)]
pub async fn stats(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    require_admin(&headers, &pool, &auth_state).await?;

    let stats = dashboard_stats(&pool)
        .await
        .map_err(ApiError::storage("Failed to fetch stats"))?;
    let recent = fetch_orders(
        &pool,
        OrderFilter {
            limit: Some(RECENT_ORDERS),
            ..OrderFilter::default()
        },
    )
    .await
    .map_err(ApiError::storage("Failed to fetch stats"))?;

    Ok(Json(StatsResponse {
        stats,
        recent_orders: recent.into_iter().map(AdminOrderView::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    responses(
        (status = 200, description = "Every order, newest first", body = AdminOrdersResponse),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody)
    ),
    tag = "admin"
)]
pub async fn orders(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<AdminOrdersResponse>, ApiError> {
    require_admin(&headers, &pool, &auth_state).await?;

    let orders = fetch_orders(&pool, OrderFilter::default())
        .await
        .map_err(ApiError::storage("Failed to fetch orders"))?;

    Ok(Json(AdminOrdersResponse {
        orders: orders.into_iter().map(AdminOrderView::from).collect(),
    }))
}

async fn set_status(pool: &PgPool, id: Uuid, status: OrderStatus) -> Result<bool> {
    let query = "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2";
    let result = sqlx::query(query)
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await
        .context("failed to update order status")?;
    Ok(result.rows_affected() > 0)
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = AdminOrderResponse),
        (status = 400, description = "Unknown status value", body = crate::api::error::ErrorBody),
        (status = 401, description = "Not signed in", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown order", body = crate::api::error::ErrorBody)
    ),
    tag = "admin"
)]
pub async fn update_order(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    payload: Option<Json<UpdateStatusRequest>>,
) -> Result<Json<AdminOrderResponse>, ApiError> {
    let admin = require_admin(&headers, &pool, &auth_state).await?;
    let id = parse_id(&id, "order")?;

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let Some(status) = request.status.as_deref().and_then(OrderStatus::parse) else {
        return Err(ApiError::InvalidInput("Invalid order status".to_string()));
    };

    if !set_status(&pool, id, status)
        .await
        .map_err(ApiError::storage("Failed to update order"))?
    {
        return Err(ApiError::NotFound("Order not found".to_string()));
    }
    info!(order_id = %id, status = status.as_str(), admin_id = %admin.id, "order status changed");

    let order = fetch_orders(
        &pool,
        OrderFilter {
            id: Some(id),
            limit: Some(1),
            ..OrderFilter::default()
        },
    )
    .await
    .map_err(ApiError::storage("Failed to update order"))?
    .into_iter()
    .next()
    .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    Ok(Json(AdminOrderResponse {
        order: AdminOrderView::from(order),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::orders::DeliveryType;

    #[test]
    fn admin_order_view_flattens_order() -> anyhow::Result<()> {
        let view = AdminOrderView {
            order: OrderView {
                id: Uuid::nil().to_string(),
                order_number: "BPK1ABCD".to_string(),
                status: OrderStatus::Preparing,
                subtotal: 200.0,
                tax: 10.0,
                delivery_fee: 30.0,
                total_amount: 240.0,
                delivery_type: DeliveryType::Delivery,
                payment_method: "cod".to_string(),
                delivery_address: "1, A, B - 2".to_string(),
                delivery_phone: "9999999999".to_string(),
                notes: None,
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
                updated_at: "2024-01-01T00:00:00.000Z".to_string(),
                items: Vec::new(),
            },
            customer_name: "a".to_string(),
            customer_email: "a@x.com".to_string(),
        };
        let value = serde_json::to_value(&view)?;
        assert_eq!(value["orderNumber"], "BPK1ABCD");
        assert_eq!(value["status"], "PREPARING");
        assert_eq!(value["customerName"], "a");
        assert_eq!(value["deliveryType"], "delivery");
        assert!(value.get("order").is_none());
        Ok(())
    }

    #[test]
    fn check_response_shape() -> anyhow::Result<()> {
        let value = serde_json::to_value(AdminCheckResponse { is_admin: false })?;
        assert_eq!(value, serde_json::json!({ "isAdmin": false }));
        Ok(())
    }
}
