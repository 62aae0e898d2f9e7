//! Projections: read models built from published envelopes.
//!
//! All projections are:
//! - **Rebuildable**: `rebuild_from_scratch` replays the full event log
//! - **Idempotent**: redelivered envelopes are skipped via per-stream cursors
//! - **Selective**: envelopes for aggregate types they do not follow are ignored

use serde_json::Value as JsonValue;
use thiserror::Error;

use inkwell_events::EventEnvelope;

use crate::read_model::ReadStoreError;

pub mod catalog;
pub mod cursor;
pub mod dashboard;
pub mod orders;
pub mod stock;

pub use catalog::CatalogProjection;
pub use cursor::{CursorCheck, StreamCursors};
pub use dashboard::{CategorySales, Dashboard, LowStockRow, dashboard};
pub use orders::{OrderSummary, OrdersProjection};
pub use stock::{StockLevel, StockProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event does not belong to its stream: {0}")]
    StreamMismatch(String),

    #[error(transparent)]
    Store(#[from] ReadStoreError),
}

/// A read model fed from the bus.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Forget cursors and wipe the read model.
    fn reset(&self);

    /// Rebuild from a full replay, in commit order.
    fn rebuild_from_scratch(
        &self,
        envelopes: &[EventEnvelope<JsonValue>],
    ) -> Result<(), ProjectionError> {
        self.reset();
        for env in envelopes {
            self.apply_envelope(env)?;
        }
        tracing::info!(projection = self.name(), events = envelopes.len(), "projection rebuilt");
        Ok(())
    }
}

pub(crate) fn decode<E: serde::de::DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize(e.to_string()))
}
