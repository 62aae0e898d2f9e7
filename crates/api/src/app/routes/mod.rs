use axum::Router;

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod home;
pub mod inventory;
pub mod newsletter;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod system;

/// Public shop endpoints. Runs behind `storefront_middleware`.
pub fn storefront_router() -> Router {
    Router::new()
        .merge(catalog::router())
        .merge(checkout::router())
        .merge(reviews::router())
        .nest("/cart", cart::router())
        .nest("/newsletter", newsletter::router())
}

/// Staff endpoints. Runs behind `auth_middleware`.
pub fn admin_router() -> Router {
    admin::router()
}
