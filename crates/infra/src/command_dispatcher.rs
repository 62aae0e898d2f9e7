//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the stream (aggregate_type + aggregate_id)
//!   ↓
//! 2. Rehydrate (apply historical events)
//!   ↓
//! 3. Handle (pure decision, produces events)
//!   ↓
//! 4. Append (optimistic concurrency on the loaded version)
//!   ↓
//! 5. Publish committed envelopes to the bus
//! ```
//!
//! The dispatcher contains no IO itself; it composes `EventStore` and `EventBus`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use inkwell_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use inkwell_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure, or a domain-level conflict.
    #[error("conflict: {0}")]
    Concurrency(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    /// Historical payload did not deserialize into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    /// Loaded stream is out of order or belongs to another aggregate.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine.
///
/// Events are persisted before publication: if append fails nothing is
/// published. If publication fails after a successful append the error is
/// returned and the events stay committed (at-least-once delivery).
///
/// Aggregates driven through the dispatcher must be deterministic and
/// side-effect free so that replay always rebuilds the same state.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate and return the committed events.
    ///
    /// A command that decides no events (an idempotent no-op) returns an
    /// empty vector and touches neither store nor bus.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: inkwell_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_type, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        tracing::debug!(
            aggregate_type,
            aggregate_id = %aggregate_id,
            events = committed.len(),
            "command dispatched"
        );

        Ok(committed)
    }

    /// Rehydrate an aggregate from its stream without handling a command.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_type, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_type: &str,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id || e.aggregate_type != aggregate_type {
            return Err(DispatchError::CorruptStream(format!(
                "loaded stream contains a foreign event at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::CorruptStream(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
