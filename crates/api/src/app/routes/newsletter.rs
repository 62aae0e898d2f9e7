use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
}

pub async fn subscribe(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::NewsletterRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    match services.update_newsletter(|list| list.subscribe(&body.email, now)) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "outcome": outcome, "message": outcome.message() })),
        )
            .into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}

pub async fn unsubscribe(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::NewsletterRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    match services.update_newsletter(|list| Ok(list.unsubscribe(&body.email, now))) {
        Ok(removed) => (StatusCode::OK, Json(json!({ "unsubscribed": removed }))).into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}
