//! Book catalog (event-sourced).
//!
//! Deterministic domain logic only: the `Product` aggregate, price display
//! rules, slug/ISBN normalisation, and in-memory catalog queries over
//! [`ProductListing`] read rows.

pub mod listing;
pub mod product;
pub mod slug;

pub use listing::{
    Breadcrumb, CatalogQuery, Category, Page, ProductListing, SortOrder, breadcrumbs, featured,
    query, related,
};
pub use product::{
    ActivateProduct, ArchiveProduct, BookDetails, BookFormat, CreateProduct, Language, Price,
    PriceDisplay, Product, ProductActivated, ProductArchived, ProductCommand, ProductCreated,
    ProductDetailsUpdated, ProductEvent, ProductId, ProductPriceSet, ProductStatus, SetPrice,
    ToggleStatus, UpdateDetails,
};
pub use slug::{generate_slug, normalize_isbn};

/// Stream type for products in the event store.
pub const AGGREGATE_TYPE: &str = "catalog.product";
