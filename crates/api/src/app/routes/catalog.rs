//! Public catalog pages: browsing, product detail and the home page.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use inkwell_catalog::{Category, ProductListing, breadcrumbs, featured, query, related};
use inkwell_storefront::resolve_section;

use crate::app::{dto, errors};
use crate::app::routes::reviews::product_reviews_json;
use crate::app::services::AppServices;

const RELATED_LIMIT: usize = 4;
const FEATURED_LIMIT: usize = 8;

pub fn router() -> Router {
    Router::new()
        .route("/catalog", get(list_catalog))
        .route("/catalog/:category", get(list_category))
        .route("/categories", get(list_categories))
        .route("/products/:slug", get(get_product))
        .route("/products/isbn/:isbn", get(get_by_isbn))
        .route("/home", get(home))
}

fn categories(services: &AppServices) -> Vec<Category> {
    services
        .catalog
        .category_slugs()
        .iter()
        .map(|slug| Category::from_slug(slug))
        .collect()
}

pub async fn list_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::CatalogParams>,
) -> axum::response::Response {
    let q = params.into_query(services.products_per_page);
    let page = query(&services.catalog.list(), &q);
    (StatusCode::OK, Json(dto::page_to_json(page))).into_response()
}

pub async fn list_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(category): Path<String>,
    Query(params): Query<dto::CatalogParams>,
) -> axum::response::Response {
    let all = categories(&services);
    let chain = Category::chain(&category, &all);
    let Some(current) = chain.last().cloned() else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "category not found");
    };

    let mut q = params.into_query(services.products_per_page);
    q.category = Some(category);
    let page = query(&services.catalog.list(), &q);

    (
        StatusCode::OK,
        Json(json!({
            "category": current,
            "breadcrumbs": breadcrumbs(&chain, None),
            "results": dto::page_to_json(page),
        })),
    )
        .into_response()
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "items": categories(&services) }))).into_response()
}

fn product_page(services: &AppServices, product: ProductListing) -> axum::response::Response {
    let all = services.catalog.list();
    let cats = categories(services);
    let chain = product
        .categories
        .first()
        .map(|slug| Category::chain(slug, &cats))
        .unwrap_or_default();

    let reviews = product_reviews_json(services, &product);
    let body = json!({
        "breadcrumbs": breadcrumbs(&chain, Some(&product)),
        "rating": reviews["rating"],
        "reviews": reviews["reviews"],
        "related": related(&product, &all, RELATED_LIMIT)
            .into_iter()
            .map(dto::listing_to_json)
            .collect::<Vec<_>>(),
        "product": dto::listing_to_json(product),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// Drafts and archived books are hidden from shoppers.
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    match services.catalog.by_slug(&slug).filter(ProductListing::is_active) {
        Some(product) => product_page(&services, product),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

/// Quick order by ISBN.
pub async fn get_by_isbn(
    Extension(services): Extension<Arc<AppServices>>,
    Path(isbn): Path<String>,
) -> axum::response::Response {
    match services.catalog.by_isbn(&isbn).filter(ProductListing::is_active) {
        Some(product) => product_page(&services, product),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no book with that ISBN"),
    }
}

/// Visible sections with their data. An empty layout falls back to the
/// newest books so the page is never blank.
pub async fn home(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let now = Utc::now();
    let layout = services.home_layout();
    let catalog = services.catalog.as_ref();

    let sections: Vec<_> = layout
        .visible(now)
        .into_iter()
        .map(|s| dto::section_to_json(s, Some(resolve_section(s, catalog, now))))
        .collect();
    let featured: Vec<_> = featured(&services.catalog.list(), FEATURED_LIMIT)
        .into_iter()
        .map(dto::listing_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "sections": sections,
            "featured": featured,
        })),
    )
        .into_response()
}
