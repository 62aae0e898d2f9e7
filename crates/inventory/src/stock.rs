use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use inkwell_events::Event;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Stock item identifier (same value as the product's id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockItemId(pub AggregateId);

impl StockItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Shelf availability as shown to shoppers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "left", rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock(i64),
    InStock,
}

impl StockStatus {
    pub fn from_levels(on_hand: i64, low_stock_threshold: i64) -> Self {
        if on_hand <= 0 {
            StockStatus::OutOfStock
        } else if on_hand <= low_stock_threshold {
            StockStatus::LowStock(on_hand)
        } else {
            StockStatus::InStock
        }
    }

    pub fn message(&self) -> String {
        match self {
            StockStatus::OutOfStock => "Out of stock".to_string(),
            StockStatus::LowStock(n) => format!("Only {n} left in stock"),
            StockStatus::InStock => "In stock".to_string(),
        }
    }
}

/// Aggregate root: StockItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: StockItemId,
    sku: String,
    on_hand: i64,
    low_stock_threshold: i64,
    /// Quantity currently committed per order.
    committed: BTreeMap<AggregateId, u32>,
    version: u64,
    created: bool,
}

impl StockItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: StockItemId) -> Self {
        Self {
            id,
            sku: String::new(),
            on_hand: 0,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            committed: BTreeMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::from_levels(self.on_hand, self.low_stock_threshold)
    }

    /// Units that can still be sold, never negative.
    pub fn available(&self) -> u32 {
        u32::try_from(self.on_hand.max(0)).unwrap_or(u32::MAX)
    }

    pub fn has_committed(&self, order_id: AggregateId) -> bool {
        self.committed.contains_key(&order_id)
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStockItem {
    pub item_id: StockItemId,
    pub sku: String,
    pub on_hand: i64,
    pub low_stock_threshold: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Absolute stock count from a manual stock-take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStock {
    pub item_id: StockItemId,
    pub on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetThreshold {
    pub item_id: StockItemId,
    pub low_stock_threshold: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Take sold units off the shelf once payment is secured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSale {
    pub item_id: StockItemId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Put an order's units back after cancellation or refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restock {
    pub item_id: StockItemId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    CreateStockItem(CreateStockItem),
    SetStock(SetStock),
    SetThreshold(SetThreshold),
    CommitSale(CommitSale),
    Restock(Restock),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemCreated {
    pub item_id: StockItemId,
    pub sku: String,
    pub on_hand: i64,
    pub low_stock_threshold: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelSet {
    pub item_id: StockItemId,
    pub previous: i64,
    pub on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub item_id: StockItemId,
    pub low_stock_threshold: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCommitted {
    pub item_id: StockItemId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub on_hand_after: i64,
    /// Units sold beyond what was on the shelf.
    pub oversold: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRestocked {
    pub item_id: StockItemId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub on_hand_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockItemCreated(StockItemCreated),
    StockLevelSet(StockLevelSet),
    ThresholdSet(ThresholdSet),
    SaleCommitted(SaleCommitted),
    SaleRestocked(SaleRestocked),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockItemCreated(_) => "inventory.stock_item.created",
            InventoryEvent::StockLevelSet(_) => "inventory.stock_item.level_set",
            InventoryEvent::ThresholdSet(_) => "inventory.stock_item.threshold_set",
            InventoryEvent::SaleCommitted(_) => "inventory.stock_item.sale_committed",
            InventoryEvent::SaleRestocked(_) => "inventory.stock_item.sale_restocked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockItemCreated(e) => e.occurred_at,
            InventoryEvent::StockLevelSet(e) => e.occurred_at,
            InventoryEvent::ThresholdSet(e) => e.occurred_at,
            InventoryEvent::SaleCommitted(e) => e.occurred_at,
            InventoryEvent::SaleRestocked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::StockItemCreated(e) => {
                self.id = e.item_id;
                self.sku = e.sku.clone();
                self.on_hand = e.on_hand;
                self.low_stock_threshold = e.low_stock_threshold;
                self.created = true;
            }
            InventoryEvent::StockLevelSet(e) => {
                self.on_hand = e.on_hand;
            }
            InventoryEvent::ThresholdSet(e) => {
                self.low_stock_threshold = e.low_stock_threshold;
            }
            InventoryEvent::SaleCommitted(e) => {
                self.on_hand = e.on_hand_after;
                self.committed.insert(e.order_id, e.quantity);
            }
            InventoryEvent::SaleRestocked(e) => {
                self.on_hand = e.on_hand_after;
                self.committed.remove(&e.order_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::CreateStockItem(cmd) => self.handle_create(cmd),
            InventoryCommand::SetStock(cmd) => self.handle_set_stock(cmd),
            InventoryCommand::SetThreshold(cmd) => self.handle_set_threshold(cmd),
            InventoryCommand::CommitSale(cmd) => self.handle_commit(cmd),
            InventoryCommand::Restock(cmd) => self.handle_restock(cmd),
        }
    }
}

impl StockItem {
    fn ensure_exists(&self, item_id: StockItemId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateStockItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock item already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if cmd.on_hand < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        let threshold = cmd.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        if threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }

        Ok(vec![InventoryEvent::StockItemCreated(StockItemCreated {
            item_id: cmd.item_id,
            sku: cmd.sku.trim().to_string(),
            on_hand: cmd.on_hand,
            low_stock_threshold: threshold,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_stock(&self, cmd: &SetStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_exists(cmd.item_id)?;
        if cmd.on_hand < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if cmd.on_hand == self.on_hand {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::StockLevelSet(StockLevelSet {
            item_id: cmd.item_id,
            previous: self.on_hand,
            on_hand: cmd.on_hand,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_threshold(&self, cmd: &SetThreshold) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_exists(cmd.item_id)?;
        if cmd.low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        if cmd.low_stock_threshold == self.low_stock_threshold {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ThresholdSet(ThresholdSet {
            item_id: cmd.item_id,
            low_stock_threshold: cmd.low_stock_threshold,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_commit(&self, cmd: &CommitSale) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_exists(cmd.item_id)?;
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.has_committed(cmd.order_id) {
            return Ok(vec![]);
        }

        // Payment is already secured, so the shelf is allowed to go negative.
        let on_hand_after = self.on_hand - i64::from(cmd.quantity);
        let oversold = u32::try_from((-on_hand_after).max(0))
            .unwrap_or(u32::MAX)
            .min(cmd.quantity);

        Ok(vec![InventoryEvent::SaleCommitted(SaleCommitted {
            item_id: cmd.item_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            on_hand_after,
            oversold,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &Restock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_exists(cmd.item_id)?;
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let Some(&committed) = self.committed.get(&cmd.order_id) else {
            return Ok(vec![]);
        };

        let quantity = cmd.quantity.min(committed);
        Ok(vec![InventoryEvent::SaleRestocked(SaleRestocked {
            item_id: cmd.item_id,
            order_id: cmd.order_id,
            quantity,
            on_hand_after: self.on_hand + i64::from(quantity),
            occurred_at: cmd.occurred_at,
        })])
    }
}
