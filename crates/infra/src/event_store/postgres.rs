//! Postgres-backed event store (`postgres` feature).
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `EventStoreError` |
//! |------------|---------------|-------------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check violation) | `23514` | `InvalidAppend` |
//! | Database (other) | any | `Storage` |
//! | PoolClosed / network / other | n/a | `Storage` |
//!
//! The [`EventStore`] trait is synchronous. The blocking adapter runs the async
//! queries with `block_in_place`, so it must be called from a multi-threaded
//! tokio runtime.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;

use inkwell_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Schema for the event and document tables.
pub const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres-backed append-only event store.
///
/// `append()` runs in a transaction: read the stream head, check the expected
/// version, insert. A concurrent writer that slips in between trips the unique
/// constraint on `(aggregate_type, aggregate_id, sequence_number)` and surfaces
/// as a concurrency error.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    pub async fn load_stream_async(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows_to_events(rows)
    }

    #[instrument(skip(self), err)]
    pub async fn load_all_async(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            ORDER BY global_position ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        rows_to_events(rows)
    }

    #[instrument(
        skip(self, events),
        fields(event_count = events.len(), expected_version = ?expected_version),
        err
    )]
    pub async fn append_async(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != aggregate_id || e.aggregate_type != aggregate_type {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch spans more than one stream (index {idx})"
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current_version = check_stream_version(&mut tx, &aggregate_type, aggregate_id).await?;

        if !expected_version.matches(current_version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current_version}"
            )));
        }

        let mut stored_events = Vec::with_capacity(events.len());
        let mut next_sequence = current_version + 1;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (
                    event_id, aggregate_id, aggregate_type, sequence_number,
                    event_type, event_version, occurred_at, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id)
            .bind(aggregate_id.as_uuid())
            .bind(&aggregate_type)
            .bind(next_sequence as i64)
            .bind(&event.event_type)
            .bind(event.event_version as i32)
            .bind(event.occurred_at)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EventStoreError::Concurrency(format!(
                        "concurrent append detected: sequence_number {next_sequence} already exists"
                    ))
                } else {
                    map_sqlx_error("insert_event", e)
                }
            })?;

            stored_events.push(StoredEvent {
                event_id: event.event_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: next_sequence,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            });
            next_sequence += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(stored_events)
    }
}

/// Current head of a stream (0 when it does not exist).
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_type: &str,
    aggregate_id: AggregateId,
) -> Result<u64, EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(sequence_number), 0) AS current_version
        FROM events
        WHERE aggregate_type = $1 AND aggregate_id = $2
        "#,
    )
    .bind(aggregate_type)
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current: i64 = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Storage(format!("failed to read current_version: {e}")))?;
    Ok(current as u64)
}

fn rows_to_events(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<StoredEvent>, EventStoreError> {
    rows.iter()
        .map(|row| {
            StoredEventRow::from_row(row)
                .map(StoredEvent::from)
                .map_err(|e| EventStoreError::Storage(format!("failed to decode event row: {e}")))
        })
        .collect()
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => EventStoreError::Storage(format!("connection pool closed in {operation}")),
        other => EventStoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Run a future to completion from synchronous code on a tokio worker thread.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, EventStoreError> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        EventStoreError::Storage("postgres stores must be used inside a tokio runtime".to_string())
    })?;
    Ok(tokio::task::block_in_place(|| handle.block_on(future)))
}

#[derive(Debug)]
struct StoredEventRow {
    event_id: uuid::Uuid,
    aggregate_id: uuid::Uuid,
    aggregate_type: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEventRow {
            event_id: row.try_get("event_id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl From<StoredEventRow> for StoredEvent {
    fn from(row: StoredEventRow) -> Self {
        StoredEvent {
            event_id: row.event_id,
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            sequence_number: row.sequence_number as u64,
            event_type: row.event_type,
            event_version: row.event_version as u32,
            occurred_at: row.occurred_at,
            payload: row.payload,
        }
    }
}

impl EventStore for PostgresEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.append_async(events, expected_version))?
    }

    fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.load_stream_async(aggregate_type, aggregate_id))?
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.load_all_async())?
    }
}
