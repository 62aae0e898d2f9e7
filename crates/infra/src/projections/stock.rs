use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use inkwell_events::EventEnvelope;
use inkwell_inventory::{InventoryEvent, StockItemId, StockStatus};

use super::cursor::{CursorCheck, StreamCursors};
use super::{Projection, ProjectionError, decode};
use crate::read_model::{ReadStore, ReadStoreError};

/// Current stock per item, for the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub item_id: StockItemId,
    pub sku: String,
    pub on_hand: i64,
    pub low_stock_threshold: i64,
    pub status: StockStatus,
    /// Units sold beyond the shelf across all orders so far.
    pub oversold: u64,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn is_low(&self) -> bool {
        self.on_hand <= self.low_stock_threshold
    }

    fn refresh(&mut self, at: DateTime<Utc>) {
        self.status = StockStatus::from_levels(self.on_hand, self.low_stock_threshold);
        self.updated_at = at;
    }
}

#[derive(Debug)]
pub struct StockProjection<S>
where
    S: ReadStore<StockItemId, StockLevel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockProjection<S>
where
    S: ReadStore<StockItemId, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, item_id: StockItemId) -> Option<StockLevel> {
        self.store.get(&item_id)
    }

    pub fn list(&self) -> Vec<StockLevel> {
        self.store.list()
    }

    /// Items at or under their threshold, emptiest first.
    pub fn low_stock(&self, limit: usize) -> Vec<StockLevel> {
        let mut low: Vec<StockLevel> = self.store.list().into_iter().filter(StockLevel::is_low).collect();
        low.sort_by(|a, b| a.on_hand.cmp(&b.on_hand).then_with(|| a.sku.cmp(&b.sku)));
        low.truncate(limit);
        low
    }

    fn update(&self, item_id: StockItemId, at: DateTime<Utc>, f: impl FnOnce(&mut StockLevel)) -> Result<(), ReadStoreError> {
        match self.store.get(&item_id) {
            Some(mut row) => {
                f(&mut row);
                row.refresh(at);
                self.store.upsert(item_id, row)
            }
            None => Ok(()),
        }
    }
}

impl<S> Projection for StockProjection<S>
where
    S: ReadStore<StockItemId, StockLevel>,
{
    fn name(&self) -> &'static str {
        "inventory.stock"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != inkwell_inventory::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Skip {
            return Ok(());
        }

        let event: InventoryEvent = decode(envelope)?;
        let item_id = StockItemId::new(envelope.aggregate_id());

        match event {
            InventoryEvent::StockItemCreated(e) => {
                if e.item_id != item_id {
                    return Err(ProjectionError::StreamMismatch(
                        "item_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    item_id,
                    StockLevel {
                        item_id,
                        sku: e.sku,
                        on_hand: e.on_hand,
                        low_stock_threshold: e.low_stock_threshold,
                        status: StockStatus::from_levels(e.on_hand, e.low_stock_threshold),
                        oversold: 0,
                        updated_at: e.occurred_at,
                    },
                )
            }
            InventoryEvent::StockLevelSet(e) => self.update(item_id, e.occurred_at, |r| r.on_hand = e.on_hand),
            InventoryEvent::ThresholdSet(e) => {
                self.update(item_id, e.occurred_at, |r| r.low_stock_threshold = e.low_stock_threshold)
            }
            InventoryEvent::SaleCommitted(e) => self.update(item_id, e.occurred_at, |r| {
                r.on_hand = e.on_hand_after;
                r.oversold += u64::from(e.oversold);
            }),
            InventoryEvent::SaleRestocked(e) => self.update(item_id, e.occurred_at, |r| r.on_hand = e.on_hand_after),
        }?;

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset(&self) {
        self.cursors.clear();
        self.store.clear();
    }
}
