//! Order placement, payment confirmation, order lookup and order history.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use inkwell_infra::checkout::{CheckoutRequest, WebhookOutcome};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{CartContext, PrincipalContext};

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub fn router() -> Router {
    Router::new()
        .route("/checkout", post(place_order))
        .route("/payments/verify", post(verify_payment))
        .route("/orders", get(order_history))
        .route("/orders/:id", get(get_order))
}

/// Webhooks bypass the storefront middleware: no cart, no bearer token.
pub fn webhook_router() -> Router {
    Router::new().route("/webhooks/razorpay", post(razorpay_webhook))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
    Json(mut body): Json<CheckoutRequest>,
) -> axum::response::Response {
    body.customer = ctx.customer();
    match services.checkout.place_order(&ctx.owner, body).await {
        Ok(placed) => (StatusCode::CREATED, Json(json!(placed))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::VerifyPaymentRequest>,
) -> axum::response::Response {
    let Some(order_id) = dto::parse_order_id(&body.order_id) else {
        return errors::invalid_id("order");
    };
    match services
        .checkout
        .verify_payment(order_id, &body.gateway_order_id, &body.payment_id, &body.signature)
    {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// The signature covers the raw bytes, so the body is taken unparsed.
pub async fn razorpay_webhook(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match services.checkout.handle_webhook(&body, signature) {
        Ok(outcome) => {
            if let WebhookOutcome::Ignored { event } = &outcome {
                tracing::debug!(event = %event, "webhook acknowledged without action");
            }
            (StatusCode::OK, Json(json!(outcome))).into_response()
        }
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// The signed-in customer's orders, newest first.
pub async fn order_history(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "sign in to see your orders");
    };
    let orders: Vec<_> = services
        .orders
        .for_customer(principal.user_id())
        .iter()
        .map(dto::order_summary_to_json)
        .collect();
    (StatusCode::OK, Json(json!({ "items": orders }))).into_response()
}

/// Owners see their orders; guests must also give the contact email.
/// Anything else is reported as not found.
pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path(id): Path<String>,
    Query(lookup): Query<dto::OrderLookup>,
) -> axum::response::Response {
    let Some(order_id) = dto::parse_order_id(&id) else {
        return errors::invalid_id("order");
    };
    let customer = principal.map(|Extension(p)| p.user_id());
    match services.checkout.load_order(order_id) {
        Ok(order) if order.visible_to(customer, lookup.email.as_deref()) => {
            (StatusCode::OK, Json(dto::order_to_json(&order))).into_response()
        }
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
