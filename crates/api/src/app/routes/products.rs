use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use inkwell_auth::Permission;
use inkwell_catalog::{
    ActivateProduct, ArchiveProduct, BookDetails, CreateProduct, Price, Product, ProductCommand, ProductId,
    SetPrice, ToggleStatus, UpdateDetails,
};
use inkwell_core::AggregateId;
use inkwell_inventory::{CreateStockItem, InventoryCommand, StockItem, StockItemId};

use crate::app::{dto, errors};
use crate::app::routes::common::{CmdAuth, guard};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).put(update_details))
        .route("/:id/price", put(set_price))
        .route("/:id/activate", post(activate_product))
        .route("/:id/archive", post(archive_product))
        .route("/:id/toggle", post(toggle_status))
}

fn dispatch_product(
    services: &AppServices,
    product_id: ProductId,
    cmd: ProductCommand,
) -> Result<usize, axum::response::Response> {
    services
        .dispatch::<Product>(
            product_id.aggregate_id(),
            inkwell_catalog::AGGREGATE_TYPE,
            cmd,
            |id| Product::empty(ProductId::new(id)),
        )
        .map(|committed| committed.len())
        .map_err(errors::dispatch_error_to_response)
}

fn committed_response(status: StatusCode, id: AggregateId, events: usize) -> axum::response::Response {
    (
        status,
        Json(json!({
            "id": id.to_string(),
            "events_committed": events,
        })),
    )
        .into_response()
}

/// Create a book, optionally with opening stock, and activate it on request.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);
    let now = Utc::now();

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        details: body.details,
        price: body.price,
        occurred_at: now,
    });
    let cmd = match CmdAuth::new(cmd, Permission::CATALOG_MANAGE).authorize(&principal) {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };
    let mut committed = match dispatch_product(&services, product_id, cmd) {
        Ok(n) => n,
        Err(resp) => return resp,
    };

    if let Some(on_hand) = body.stock {
        let sku = match services.load_product(product_id) {
            Ok(p) => p.sku().to_string(),
            Err(e) => return errors::dispatch_error_to_response(e),
        };
        let cmd = InventoryCommand::CreateStockItem(CreateStockItem {
            item_id: StockItemId::new(agg),
            sku,
            on_hand,
            low_stock_threshold: body.low_stock_threshold,
            occurred_at: now,
        });
        match services.dispatch::<StockItem>(agg, inkwell_inventory::AGGREGATE_TYPE, cmd, |id| {
            StockItem::empty(StockItemId::new(id))
        }) {
            Ok(events) => committed += events.len(),
            Err(e) => return errors::dispatch_error_to_response(e),
        }
    }

    if body.activate {
        let cmd = ProductCommand::ActivateProduct(ActivateProduct {
            product_id,
            occurred_at: now,
        });
        match dispatch_product(&services, product_id, cmd) {
            Ok(n) => committed += n,
            Err(resp) => return resp,
        }
    }

    tracing::info!(product_id = %agg, "product created");
    committed_response(StatusCode::CREATED, agg, committed)
}

/// Every product in the listing projection, drafts and archived included.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::CATALOG_MANAGE) {
        return resp;
    }
    let mut items = services.catalog.list();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let items: Vec<_> = items.into_iter().map(dto::listing_to_json).collect();
    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

/// Read straight from the aggregate so edits show up immediately.
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::CATALOG_MANAGE) {
        return resp;
    }
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let product = match services.load_product(product_id) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let stock = match services.load_stock(product_id) {
        Ok(s) if s.exists() => Some(dto::stock_to_json(&s)),
        Ok(_) => None,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "id": product_id,
            "details": product.details(),
            "price": product.price(),
            "price_display": product.price().map(Price::display),
            "status": product.status(),
            "created_at": product.created_at(),
            "stock": stock,
        })),
    )
        .into_response()
}

pub async fn update_details(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(details): Json<BookDetails>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let cmd = ProductCommand::UpdateDetails(UpdateDetails {
        product_id,
        details,
        occurred_at: Utc::now(),
    });
    run(&services, &principal, product_id, cmd)
}

pub async fn set_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(price): Json<Price>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let cmd = ProductCommand::SetPrice(SetPrice {
        product_id,
        price,
        occurred_at: Utc::now(),
    });
    run(&services, &principal, product_id, cmd)
}

pub async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let cmd = ProductCommand::ActivateProduct(ActivateProduct {
        product_id,
        occurred_at: Utc::now(),
    });
    run(&services, &principal, product_id, cmd)
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let cmd = ProductCommand::ArchiveProduct(ArchiveProduct {
        product_id,
        occurred_at: Utc::now(),
    });
    run(&services, &principal, product_id, cmd)
}

pub async fn toggle_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(product_id) = dto::parse_product_id(&id) else {
        return errors::invalid_id("product");
    };
    let cmd = ProductCommand::ToggleStatus(ToggleStatus {
        product_id,
        occurred_at: Utc::now(),
    });
    run(&services, &principal, product_id, cmd)
}

fn run(
    services: &AppServices,
    principal: &PrincipalContext,
    product_id: ProductId,
    cmd: ProductCommand,
) -> axum::response::Response {
    let cmd = match CmdAuth::new(cmd, Permission::CATALOG_MANAGE).authorize(principal) {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };
    match dispatch_product(services, product_id, cmd) {
        Ok(n) => committed_response(StatusCode::OK, product_id.aggregate_id(), n),
        Err(resp) => resp,
    }
}
