//! Inventory domain module (event-sourced).
//!
//! One `StockItem` per product, sharing the product's aggregate id. Stock
//! only leaves the shelf through `CommitSale` and comes back through `Restock`,
//! both keyed by order so each order moves stock at most once.

pub mod stock;

pub use stock::{
    CommitSale, CreateStockItem, DEFAULT_LOW_STOCK_THRESHOLD, InventoryCommand, InventoryEvent,
    Restock, SaleCommitted, SaleRestocked, SetStock, SetThreshold, StockItem, StockItemCreated,
    StockItemId, StockLevelSet, StockStatus, ThresholdSet,
};

/// Stream type for stock items in the event store.
pub const AGGREGATE_TYPE: &str = "inventory.stock_item";
