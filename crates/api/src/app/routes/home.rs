//! Home page builder: section CRUD, ordering and a scheduled preview.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use inkwell_auth::Permission;
use inkwell_storefront::{resolve_section, NewSection, SectionId, SectionType, SectionUpdate, default_config};

use crate::app::{dto, errors};
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/sections", get(list_sections).post(create_section))
        .route("/sections/reorder", post(reorder))
        .route("/sections/:id", put(update_section).delete(delete_section))
        .route("/sections/:id/toggle", post(toggle_section))
        .route("/section-types", get(section_types))
        .route("/preview", get(preview))
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub at: Option<DateTime<Utc>>,
}

pub async fn list_sections(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let layout = services.home_layout();
    let sections: Vec<_> = layout.ordered().into_iter().map(|s| dto::section_to_json(s, None)).collect();
    (StatusCode::OK, Json(json!({ "sections": sections }))).into_response()
}

/// Every section type with its default config, for the builder palette.
pub async fn section_types(Extension(principal): Extension<PrincipalContext>) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let types: Vec<_> = SectionType::ALL
        .iter()
        .map(|t| json!({ "type": t.as_str(), "default_config": default_config(*t) }))
        .collect();
    (StatusCode::OK, Json(json!({ "types": types }))).into_response()
}

pub async fn create_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewSection>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let now = Utc::now();
    match services.update_home(|layout| layout.create(body, now).cloned()) {
        Ok(section) => {
            tracing::info!(section_id = section.id, section_type = section.section_type.as_str(), "home section created");
            (StatusCode::CREATED, Json(dto::section_to_json(&section, None))).into_response()
        }
        Err(e) => errors::document_error_to_response(e),
    }
}

pub async fn update_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SectionId>,
    Json(body): Json<SectionUpdate>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let now = Utc::now();
    match services.update_home(|layout| layout.update(id, body, now).cloned()) {
        Ok(section) => (StatusCode::OK, Json(dto::section_to_json(&section, None))).into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}

pub async fn delete_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SectionId>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    match services.update_home(|layout| layout.delete(id)) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}

pub async fn toggle_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<SectionId>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let now = Utc::now();
    match services.update_home(|layout| layout.toggle(id, now)) {
        Ok(active) => (StatusCode::OK, Json(json!({ "id": id, "active": active }))).into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}

/// Unknown ids in the request are skipped.
pub async fn reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ReorderRequest>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let now = Utc::now();
    let positions: Vec<(SectionId, i32)> = body.positions.iter().map(|p| (p.id, p.position)).collect();
    match services.update_home(|layout| Ok(layout.reorder(&positions, now))) {
        Ok(updated) => (StatusCode::OK, Json(json!({ "updated": updated }))).into_response(),
        Err(e) => errors::document_error_to_response(e),
    }
}

/// What the home page would show at `at` (defaults to now).
pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<PreviewQuery>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal, Permission::HOME_MANAGE) {
        return resp;
    }
    let at = q.at.unwrap_or_else(Utc::now);
    let layout = services.home_layout();
    let catalog = services.catalog.as_ref();
    let sections: Vec<_> = layout
        .visible(at)
        .into_iter()
        .map(|s| dto::section_to_json(s, Some(resolve_section(s, catalog, at))))
        .collect();
    (StatusCode::OK, Json(json!({ "at": at, "sections": sections }))).into_response()
}
