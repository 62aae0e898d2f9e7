use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use inkwell_auth::Permission;
use inkwell_pricing::Coupon;

use crate::app::errors;
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/:code/deactivate", post(deactivate_coupon))
        .route("/:code/redemptions", get(redemptions))
}

pub async fn list_coupons(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::COUPONS_MANAGE) {
        return resp;
    }
    (StatusCode::OK, Json(json!({ "items": services.checkout.coupons() }))).into_response()
}

pub async fn create_coupon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(coupon): Json<Coupon>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::COUPONS_MANAGE) {
        return resp;
    }
    match services.checkout.create_coupon(coupon) {
        Ok(coupon) => {
            tracing::info!(code = %coupon.code, "coupon created");
            (StatusCode::CREATED, Json(json!(coupon))).into_response()
        }
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn deactivate_coupon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::COUPONS_MANAGE) {
        return resp;
    }
    match services.checkout.deactivate_coupon(&code) {
        Ok(coupon) => (StatusCode::OK, Json(json!(coupon))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// An unused code reports zero redemptions rather than 404.
pub async fn redemptions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::COUPONS_MANAGE) {
        return resp;
    }
    let redemptions = services.checkout.redemptions(&code).unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "code": Coupon::normalize_code(&code),
            "count": redemptions.orders.len(),
            "orders": redemptions.orders,
            "by_customer": redemptions.by_customer,
        })),
    )
        .into_response()
}
