//! HTTP API for the Inkwell bookstore: storefront, checkout and back office.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
