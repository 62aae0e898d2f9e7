//! Back-office order management.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use inkwell_auth::Permission;
use inkwell_orders::OrderStatus;

use crate::app::{dto, errors};
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

const DEFAULT_LIMIT: usize = 50;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", post(change_status))
        .route("/:id/refund", post(refund))
        .route("/by-gateway/:gateway_order_id", get(by_gateway_order))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::AdminOrdersQuery>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::ORDERS_READ) {
        return resp;
    }
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let mut orders = match q.status.as_deref() {
        Some(raw) => match OrderStatus::parse(raw) {
            Some(status) => services.orders.by_status(status),
            None => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    format!("unknown order status: {raw}"),
                );
            }
        },
        None => services.orders.recent(limit),
    };
    orders.truncate(limit);
    let items: Vec<_> = orders.iter().map(dto::order_summary_to_json).collect();
    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::ORDERS_READ) {
        return resp;
    }
    let Some(order_id) = dto::parse_order_id(&id) else {
        return errors::invalid_id("order");
    };
    match services.checkout.load_order(order_id) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Support lookup by the gateway's order reference.
pub async fn by_gateway_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(gateway_order_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::ORDERS_READ) {
        return resp;
    }
    let Some(order_id) = services.orders.by_gateway_order(&gateway_order_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "no order for that gateway reference");
    };
    match services.checkout.load_order(order_id) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::ORDERS_MANAGE) {
        return resp;
    }
    let Some(order_id) = dto::parse_order_id(&id) else {
        return errors::invalid_id("order");
    };
    let Some(status) = OrderStatus::parse(&body.status) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("unknown order status: {}", body.status),
        );
    };
    match services.checkout.change_status(order_id, status).await {
        Ok(order) => {
            tracing::info!(order_id = %order_id.aggregate_id(), status = ?status, "order status changed");
            (StatusCode::OK, Json(dto::order_to_json(&order))).into_response()
        }
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn refund(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::ORDERS_MANAGE) {
        return resp;
    }
    let Some(order_id) = dto::parse_order_id(&id) else {
        return errors::invalid_id("order");
    };
    match services.checkout.refund(order_id).await {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
