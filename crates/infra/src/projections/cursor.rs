//! Per-stream projection cursors.
//!
//! A cursor is the last sequence number a projection applied for one
//! `(aggregate_type, aggregate_id)` stream. Replays at or below the cursor are
//! skipped; anything other than `last + 1` after the first event is rejected.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use inkwell_core::AggregateId;
use inkwell_events::EventEnvelope;

use super::ProjectionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    aggregate_type: String,
    aggregate_id: AggregateId,
}

/// What to do with an incoming envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorCheck {
    /// Next in line; apply then `advance`.
    Apply,
    /// Already seen (at-least-once redelivery).
    Skip,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, envelope: &EventEnvelope<JsonValue>) -> u64 {
        let key = key_of(envelope);
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(&key).copied())
            .unwrap_or(0)
    }

    pub fn check(&self, envelope: &EventEnvelope<JsonValue>) -> Result<CursorCheck, ProjectionError> {
        let last = self.last(envelope);
        let seq = envelope.sequence_number();

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(CursorCheck::Skip);
        }
        // The first event seen may be any positive sequence (a projection can
        // start mid-stream); after that increments must be strict.
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(CursorCheck::Apply)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Ok(mut m) = self.inner.write() {
            m.insert(key_of(envelope), envelope.sequence_number());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}

fn key_of(envelope: &EventEnvelope<JsonValue>) -> CursorKey {
    CursorKey {
        aggregate_type: envelope.aggregate_type().to_string(),
        aggregate_id: envelope.aggregate_id(),
    }
}
