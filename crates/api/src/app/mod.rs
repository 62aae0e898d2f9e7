//! HTTP application wiring.
//!
//! - `services.rs`: stores, projections, workers and the checkout service
//! - `routes/`: handlers, one file per area of the shop
//! - `dto.rs`: request bodies and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, services::ServicesError> {
    let jwt = Arc::new(inkwell_auth::Hs256JwtValidator::new(config.jwt_secret.clone().into_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(config).await?);

    let storefront = routes::storefront_router().layer(axum::middleware::from_fn_with_state(
        auth_state.clone(),
        middleware::storefront_middleware,
    ));
    let admin = routes::admin_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(storefront)
        .merge(routes::checkout::webhook_router())
        .nest("/admin", admin)
        .layer(ServiceBuilder::new().layer(Extension(services))))
}
