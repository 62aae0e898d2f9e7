//! Postgres-backed document store (`postgres` feature).
//!
//! Every collection shares the `read_documents` table; rows are keyed by
//! `(collection, key)` and hold the value as JSONB. Used for state that is not
//! event-sourced: carts, coupons, the home layout and newsletter subscribers.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};

use super::{ReadStore, ReadStoreError};
use crate::event_store::postgres::{block_on, map_sqlx_error};

pub struct PostgresDocumentStore<K, V> {
    pool: Arc<PgPool>,
    collection: &'static str,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> PostgresDocumentStore<K, V> {
    pub fn new(pool: PgPool, collection: &'static str) -> Self {
        Self {
            pool: Arc::new(pool),
            collection,
            _marker: PhantomData,
        }
    }

    fn decode(&self, body: serde_json::Value) -> Option<V>
    where
        V: DeserializeOwned,
    {
        match serde_json::from_value(body) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(collection = self.collection, error = %e, "undecodable document");
                None
            }
        }
    }
}

impl<K, V> ReadStore<K, V> for PostgresDocumentStore<K, V>
where
    K: Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let result = block_on(
            sqlx::query("SELECT body FROM read_documents WHERE collection = $1 AND key = $2")
                .bind(self.collection)
                .bind(key.to_string())
                .fetch_optional(&*self.pool),
        );
        match result {
            Ok(Ok(Some(row))) => row.try_get("body").ok().and_then(|body| self.decode(body)),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!(collection = self.collection, error = %map_sqlx_error("get", e), "document read failed");
                None
            }
            Err(e) => {
                tracing::warn!(collection = self.collection, error = %e, "document read failed");
                None
            }
        }
    }

    fn upsert(&self, key: K, value: V) -> Result<(), ReadStoreError> {
        let body = serde_json::to_value(&value).map_err(|e| ReadStoreError::Encode(e.to_string()))?;
        let result = block_on(
            sqlx::query(
                r#"
                INSERT INTO read_documents (collection, key, body)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, key)
                DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
                "#,
            )
            .bind(self.collection)
            .bind(key.to_string())
            .bind(body)
            .execute(&*self.pool),
        );
        result
            .and_then(|r| r.map_err(|e| map_sqlx_error("upsert", e)))
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(collection = self.collection, error = %e, "document write failed");
                ReadStoreError::Unavailable(e.to_string())
            })
    }

    fn remove(&self, key: &K) -> Result<Option<V>, ReadStoreError> {
        let result = block_on(
            sqlx::query("DELETE FROM read_documents WHERE collection = $1 AND key = $2 RETURNING body")
                .bind(self.collection)
                .bind(key.to_string())
                .fetch_optional(&*self.pool),
        );
        match result.and_then(|r| r.map_err(|e| map_sqlx_error("remove", e))) {
            Ok(row) => Ok(row
                .and_then(|row| row.try_get("body").ok())
                .and_then(|body| self.decode(body))),
            Err(e) => {
                tracing::warn!(collection = self.collection, error = %e, "document delete failed");
                Err(ReadStoreError::Unavailable(e.to_string()))
            }
        }
    }

    fn list(&self) -> Vec<V> {
        let result = block_on(
            sqlx::query("SELECT body FROM read_documents WHERE collection = $1 ORDER BY key")
                .bind(self.collection)
                .fetch_all(&*self.pool),
        );
        match result.and_then(|r| r.map_err(|e| map_sqlx_error("list", e))) {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| row.try_get("body").ok())
                .filter_map(|body| self.decode(body))
                .collect(),
            Err(e) => {
                tracing::warn!(collection = self.collection, error = %e, "document list failed");
                vec![]
            }
        }
    }

    fn clear(&self) {
        let result = block_on(
            sqlx::query("DELETE FROM read_documents WHERE collection = $1")
                .bind(self.collection)
                .execute(&*self.pool),
        );
        if let Err(e) = result.and_then(|r| r.map_err(|e| map_sqlx_error("clear", e))) {
            tracing::warn!(collection = self.collection, error = %e, "document clear failed");
        }
    }
}
