//! Key/value storage for disposable read models and mutable documents.

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod store;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;
pub use store::{InMemoryReadStore, ReadStore, ReadStoreError};
