//! Back-office surface. Everything here sits behind `auth_middleware`.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use inkwell_auth::Permission;

use crate::app::routes::{common::guard, coupons, home, inventory, orders, products, reviews, system};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/dashboard", get(dashboard))
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/orders", orders::router())
        .nest("/coupons", coupons::router())
        .nest("/home", home::router())
        .nest("/reviews", reviews::admin_router())
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::DASHBOARD_READ) {
        return resp;
    }
    (StatusCode::OK, Json(json!(services.dashboard()))).into_response()
}
