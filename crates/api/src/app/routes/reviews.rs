//! Reader reviews on product pages and the staff moderation queue.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use inkwell_auth::Permission;
use inkwell_catalog::ProductListing;
use inkwell_storefront::{display_name, NewReview, Review, ReviewId};

use crate::app::{dto, errors};
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Reviews shown on a product page.
pub const PAGE_LIMIT: usize = 10;

pub fn router() -> Router {
    Router::new().route("/products/:slug/reviews", get(list_reviews).post(submit_review))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(moderation_queue))
        .route("/:id/approve", post(approve_review))
        .route("/:id/reject", post(reject_review))
}

fn active_book(services: &AppServices, slug: &str) -> Result<ProductListing, axum::response::Response> {
    services
        .catalog
        .by_slug(slug)
        .filter(ProductListing::is_active)
        .ok_or_else(|| errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"))
}

fn review_to_json(review: &Review) -> serde_json::Value {
    json!({
        "id": review.id,
        "author": review.author_name,
        "rating": review.rating,
        "title": review.title,
        "body": review.body,
        "created_at": review.created_at,
    })
}

/// Approved reviews and the rating summary, for the product page.
pub fn product_reviews_json(services: &AppServices, product: &ProductListing) -> serde_json::Value {
    let book = services.reviews();
    let reviews: Vec<_> = book.approved_for(product.id, PAGE_LIMIT).into_iter().map(review_to_json).collect();
    json!({ "rating": book.summary(product.id), "reviews": reviews })
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    match active_book(&services, &slug) {
        Ok(product) => (StatusCode::OK, Json(product_reviews_json(&services, &product))).into_response(),
        Err(resp) => resp,
    }
}

/// Signed-in readers only. The review waits for staff approval.
pub async fn submit_review(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path(slug): Path<String>,
    Json(body): Json<NewReview>,
) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "sign in to write a review");
    };
    let product = match active_book(&services, &slug) {
        Ok(product) => product,
        Err(resp) => return resp,
    };

    let now = Utc::now();
    let author = display_name(principal.email());
    match services.update_reviews(|book| book.submit(product.id, principal.user_id(), &author, body, now).cloned()) {
        Ok(review) => {
            tracing::info!(review_id = review.id, product_id = %product.id.0, rating = review.rating, "review submitted");
            (
                StatusCode::CREATED,
                Json(json!({
                    "review": review_to_json(&review),
                    "approved": review.approved,
                    "message": "Thanks! Your review will appear once it has been approved.",
                })),
            )
                .into_response()
        }
        Err(e) => errors::document_error_to_response(e),
    }
}

/// `?status=approved` lists published reviews; anything else the pending queue.
pub async fn moderation_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::ReviewQueueQuery>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::CATALOG_MANAGE) {
        return resp;
    }
    let book = services.reviews();
    let approved = q.status.as_deref() == Some("approved");
    let listings = services.catalog.list();
    let queue = if approved { book.approved() } else { book.pending() };
    let items: Vec<_> = queue
        .into_iter()
        .map(|review| {
            let mut body = review_to_json(review);
            if let Some(obj) = body.as_object_mut() {
                let title = listings.iter().find(|p| p.id == review.product_id).map(|p| p.title.clone());
                obj.insert("product_id".into(), json!(review.product_id));
                obj.insert("product_title".into(), json!(title));
                obj.insert("approved".into(), json!(review.approved));
            }
            body
        })
        .collect();
    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

pub async fn approve_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ReviewId>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::CATALOG_MANAGE) {
        return resp;
    }
    match services.update_reviews(|book| book.approve(id).cloned()) {
        Ok(review) => {
            tracing::info!(review_id = id, "review approved");
            (StatusCode::OK, Json(review_to_json(&review))).into_response()
        }
        Err(e) => errors::document_error_to_response(e),
    }
}

pub async fn reject_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<ReviewId>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::CATALOG_MANAGE) {
        return resp;
    }
    match services.update_reviews(|book| book.reject(id)) {
        Ok(_) => {
            tracing::info!(review_id = id, "review rejected");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::document_error_to_response(e),
    }
}
