use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use inkwell_catalog::{
    BookDetails, Price, ProductEvent, ProductId, ProductListing, ProductStatus, normalize_isbn,
};
use inkwell_events::EventEnvelope;
use inkwell_inventory::{DEFAULT_LOW_STOCK_THRESHOLD, InventoryEvent};
use inkwell_storefront::ProductSource;

use super::cursor::{CursorCheck, StreamCursors};
use super::{Projection, ProjectionError, decode};
use crate::read_model::{ReadStore, ReadStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Levels {
    on_hand: i64,
    low_stock_threshold: i64,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            on_hand: 0,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

/// Storefront listing rows: product details joined with stock levels.
///
/// Follows both `catalog.product` and `inventory.stock_item` streams. Stock
/// can arrive before its product; levels are kept on the side and merged
/// when the listing row appears.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: ReadStore<ProductId, ProductListing>,
{
    store: S,
    levels: RwLock<HashMap<ProductId, Levels>>,
    cursors: StreamCursors,
}

impl<S> CatalogProjection<S>
where
    S: ReadStore<ProductId, ProductListing>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            levels: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: ProductId) -> Option<ProductListing> {
        self.store.get(&id)
    }

    /// Every row, whatever its status.
    pub fn list(&self) -> Vec<ProductListing> {
        self.store.list()
    }

    pub fn by_slug(&self, slug: &str) -> Option<ProductListing> {
        self.store.list().into_iter().find(|p| p.slug == slug)
    }

    pub fn by_isbn(&self, isbn: &str) -> Option<ProductListing> {
        let isbn = normalize_isbn(isbn);
        if isbn.is_empty() {
            return None;
        }
        self.store
            .list()
            .into_iter()
            .find(|p| p.isbn.as_deref() == Some(isbn.as_str()))
    }

    /// Distinct category slugs used by active products, sorted.
    pub fn category_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.is_active())
            .flat_map(|p| p.categories)
            .collect();
        slugs.sort();
        slugs.dedup();
        slugs
    }

    fn levels_of(&self, id: ProductId) -> Levels {
        self.levels
            .read()
            .ok()
            .and_then(|m| m.get(&id).copied())
            .unwrap_or_default()
    }

    fn set_levels(&self, id: ProductId, update: impl FnOnce(&mut Levels)) -> Result<(), ReadStoreError> {
        let levels = match self.levels.write() {
            Ok(mut m) => {
                let entry = m.entry(id).or_default();
                update(entry);
                *entry
            }
            Err(_) => return Err(ReadStoreError::Unavailable("stock levels lock poisoned".to_string())),
        };
        match self.store.get(&id) {
            Some(mut row) => {
                row.on_hand = levels.on_hand;
                row.low_stock_threshold = levels.low_stock_threshold;
                self.store.upsert(id, row)
            }
            None => Ok(()),
        }
    }

    fn new_row(&self, id: ProductId, details: &BookDetails, price: Option<Price>, at: DateTime<Utc>) -> ProductListing {
        let levels = self.levels_of(id);
        ProductListing {
            id,
            title: details.title.clone(),
            slug: details.slug.clone(),
            sku: details.sku.clone(),
            isbn: details.isbn.clone(),
            description: details.description.clone(),
            language: details.language,
            format: details.format,
            pages: details.pages,
            authors: details.authors.clone(),
            categories: details.categories.clone(),
            publisher: details.publisher.clone(),
            price,
            bestseller: details.bestseller,
            new_arrival: details.new_arrival,
            status: ProductStatus::Draft,
            created_at: at,
            on_hand: levels.on_hand,
            low_stock_threshold: levels.low_stock_threshold,
        }
    }

    fn update_row(&self, id: ProductId, f: impl FnOnce(&mut ProductListing)) -> Result<(), ReadStoreError> {
        match self.store.get(&id) {
            Some(mut row) => {
                f(&mut row);
                self.store.upsert(id, row)
            }
            None => Ok(()),
        }
    }

    fn apply_product(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: ProductEvent = decode(envelope)?;
        let id = match &event {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductDetailsUpdated(e) => e.product_id,
            ProductEvent::ProductPriceSet(e) => e.product_id,
            ProductEvent::ProductActivated(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
        };
        if id.aggregate_id() != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(
                "product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ProductEvent::ProductCreated(e) => {
                let row = self.new_row(id, &e.details, e.price, e.occurred_at);
                self.store.upsert(id, row)
            }
            ProductEvent::ProductDetailsUpdated(e) => self.update_row(id, |row| {
                let d = e.details;
                row.title = d.title;
                row.slug = d.slug;
                row.sku = d.sku;
                row.isbn = d.isbn;
                row.description = d.description;
                row.language = d.language;
                row.format = d.format;
                row.pages = d.pages;
                row.authors = d.authors;
                row.categories = d.categories;
                row.publisher = d.publisher;
                row.bestseller = d.bestseller;
                row.new_arrival = d.new_arrival;
            }),
            ProductEvent::ProductPriceSet(e) => self.update_row(id, |row| row.price = Some(e.price)),
            ProductEvent::ProductActivated(_) => self.update_row(id, |row| row.status = ProductStatus::Active),
            ProductEvent::ProductArchived(_) => self.update_row(id, |row| row.status = ProductStatus::Archived),
        }?;
        Ok(())
    }

    fn apply_stock(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: InventoryEvent = decode(envelope)?;
        let id = ProductId::new(envelope.aggregate_id());

        match event {
            InventoryEvent::StockItemCreated(e) => self.set_levels(id, |l| {
                l.on_hand = e.on_hand;
                l.low_stock_threshold = e.low_stock_threshold;
            }),
            InventoryEvent::StockLevelSet(e) => self.set_levels(id, |l| l.on_hand = e.on_hand),
            InventoryEvent::ThresholdSet(e) => self.set_levels(id, |l| l.low_stock_threshold = e.low_stock_threshold),
            InventoryEvent::SaleCommitted(e) => self.set_levels(id, |l| l.on_hand = e.on_hand_after),
            InventoryEvent::SaleRestocked(e) => self.set_levels(id, |l| l.on_hand = e.on_hand_after),
        }?;
        Ok(())
    }
}

impl<S> Projection for CatalogProjection<S>
where
    S: ReadStore<ProductId, ProductListing>,
{
    fn name(&self) -> &'static str {
        "catalog.listing"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let is_product = match envelope.aggregate_type() {
            inkwell_catalog::AGGREGATE_TYPE => true,
            inkwell_inventory::AGGREGATE_TYPE => false,
            _ => return Ok(()),
        };
        if self.cursors.check(envelope)? == CursorCheck::Skip {
            return Ok(());
        }
        if is_product {
            self.apply_product(envelope)?;
        } else {
            self.apply_stock(envelope)?;
        }
        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset(&self) {
        self.cursors.clear();
        if let Ok(mut m) = self.levels.write() {
            m.clear();
        }
        self.store.clear();
    }
}

impl<S> ProductSource for CatalogProjection<S>
where
    S: ReadStore<ProductId, ProductListing>,
{
    fn find(&self, id: ProductId) -> Option<ProductListing> {
        self.get(id)
    }

    fn all(&self) -> Vec<ProductListing> {
        self.list()
    }
}
