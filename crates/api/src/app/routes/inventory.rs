use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use inkwell_auth::Permission;
use inkwell_inventory::{CreateStockItem, InventoryCommand, SetStock, SetThreshold, StockItem, StockItemId};

use crate::app::{dto, errors};
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

const LOW_STOCK_LIMIT: usize = 50;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock))
        .route("/:id", get(get_stock).put(set_stock))
}

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    #[serde(default)]
    pub low: bool,
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<StockQuery>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::INVENTORY_MANAGE) {
        return resp;
    }
    let items = if q.low {
        services.stock.low_stock(LOW_STOCK_LIMIT)
    } else {
        services.stock.list()
    };
    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::INVENTORY_MANAGE) {
        return resp;
    }
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    match services.load_stock(product_id) {
        Ok(item) if item.exists() => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "stock is not tracked for this product"),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Stock-take for a product. Starts tracking stock the first time it is called.
pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStockRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::INVENTORY_MANAGE) {
        return resp;
    }
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let agg = product_id.aggregate_id();
    let item_id = StockItemId::new(agg);
    let now = Utc::now();

    let current = match services.load_stock(product_id) {
        Ok(item) => item,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let mut commands = Vec::new();
    if current.exists() {
        if let Some(on_hand) = body.on_hand {
            commands.push(InventoryCommand::SetStock(SetStock {
                item_id,
                on_hand,
                occurred_at: now,
            }));
        }
        if let Some(low_stock_threshold) = body.low_stock_threshold {
            commands.push(InventoryCommand::SetThreshold(SetThreshold {
                item_id,
                low_stock_threshold,
                occurred_at: now,
            }));
        }
    } else {
        let sku = match services.load_product(product_id) {
            Ok(p) => p.sku().to_string(),
            Err(e) => return errors::dispatch_error_to_response(e),
        };
        commands.push(InventoryCommand::CreateStockItem(CreateStockItem {
            item_id,
            sku,
            on_hand: body.on_hand.unwrap_or(0),
            low_stock_threshold: body.low_stock_threshold,
            occurred_at: now,
        }));
    }
    if commands.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "nothing to update");
    }

    for cmd in commands {
        if let Err(e) = services.dispatch::<StockItem>(agg, inkwell_inventory::AGGREGATE_TYPE, cmd, |id| {
            StockItem::empty(StockItemId::new(id))
        }) {
            return errors::dispatch_error_to_response(e);
        }
    }

    match services.load_stock(product_id) {
        Ok(item) => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
