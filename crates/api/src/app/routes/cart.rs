//! Shopping cart. The owner comes from the storefront middleware.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use inkwell_orders::{Cart, PaymentMethod};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{CartContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(set_quantity).delete(remove_item))
        .route("/count", get(count))
        .route("/merge", post(merge))
        .route("/coupon", post(apply_coupon))
}

fn cart_response(services: &AppServices, status: StatusCode, cart: &Cart) -> axum::response::Response {
    let body = dto::cart_to_json(cart, |id| services.catalog.get(id));
    (status, Json(body)).into_response()
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
) -> axum::response::Response {
    let cart = services.checkout.cart(&ctx.owner);
    cart_response(&services, StatusCode::OK, &cart)
}

pub async fn count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
) -> axum::response::Response {
    let cart = services.checkout.cart(&ctx.owner);
    (StatusCode::OK, Json(json!({ "count": cart.item_count() }))).into_response()
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&body.product_id) else {
        return errors::invalid_id("product");
    };
    match services.checkout.add_to_cart(&ctx.owner, product_id, body.quantity) {
        Ok(cart) => cart_response(&services, StatusCode::OK, &cart),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// Zero or a negative quantity removes the line.
pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::SetQuantityRequest>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&product_id) else {
        return errors::invalid_id("product");
    };
    match services.checkout.set_cart_quantity(&ctx.owner, product_id, body.quantity) {
        Ok(cart) => cart_response(&services, StatusCode::OK, &cart),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&product_id) else {
        return errors::invalid_id("product");
    };
    match services.checkout.remove_from_cart(&ctx.owner, product_id) {
        Ok(cart) => cart_response(&services, StatusCode::OK, &cart),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
) -> axum::response::Response {
    match services.checkout.clear_cart(&ctx.owner) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// After sign-in: fold the guest cart into the customer's own.
pub async fn merge(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
    principal: Option<Extension<PrincipalContext>>,
    body: Option<Json<dto::MergeCartRequest>>,
) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "sign in to merge carts");
    };
    let session = body.and_then(|Json(b)| b.session).or(ctx.session);
    let Some(session) = session else {
        return errors::json_error(StatusCode::BAD_REQUEST, "missing_session", "no guest cart session given");
    };
    match services.checkout.merge_carts(&session, principal.user_id()) {
        Ok(cart) => cart_response(&services, StatusCode::OK, &cart),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// Price the cart with a coupon applied.
pub async fn apply_coupon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CartContext>,
    Json(body): Json<dto::ApplyCouponRequest>,
) -> axum::response::Response {
    let method = body.method.unwrap_or(PaymentMethod::Razorpay);
    match services
        .checkout
        .quote(&ctx.owner, Some(&body.code), body.state.as_deref(), method)
    {
        Ok(quote) => (StatusCode::OK, Json(dto::quote_to_json(&quote))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
