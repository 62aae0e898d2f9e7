use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let resolved = principal.to_principal();
    Json(serde_json::json!({
        "principal_id": principal.principal_id().to_string(),
        "email": principal.email(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": resolved.permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
