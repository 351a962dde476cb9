//! Store capability consumed by uniqueness and existence probes.
//!
//! Defines [`StoreClient`], the single-operation trait a backing store
//! implements, and [`MemoryStore`], an in-process implementation for tests
//! and embedders without a database.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Column-to-value equality filter. Every entry must match.
pub type Filter = Map<String, Value>;

/// Rows returned by a store query. An empty `rows` means "no match".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Value>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A backing store that can answer equality queries against a collection.
pub trait StoreClient: Send + Sync {
    /// Fetch the rows of `collection` matching every entry in `filter`.
    fn get(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<QueryResult, StoreError>> + Send;
}

impl<S: StoreClient> StoreClient for Arc<S> {
    fn get(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<QueryResult, StoreError>> + Send {
        (**self).get(collection, filter)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Collections of JSON rows held in memory.
///
/// Built up front and read-only afterwards. A failure or latency can be
/// injected to exercise probe error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Value>>,
    failure: Option<StoreError>,
    latency: Option<Duration>,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `rows` to `collection`, creating it if needed.
    pub fn with_rows(mut self, collection: impl Into<String>, rows: Vec<Value>) -> Self {
        self.collections
            .entry(collection.into())
            .or_default()
            .extend(rows);
        self
    }

    /// Make every query fail with `error`.
    pub fn failing_with(mut self, error: StoreError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Delay every query by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of queries received so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Highest number of queries that were in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn matching_rows(&self, collection: &str, filter: &Filter) -> Vec<Value> {
        let Some(rows) = self.collections.get(collection) else {
            return Vec::new();
        };
        rows.iter()
            .filter(|row| {
                filter
                    .iter()
                    .all(|(column, expected)| row.get(column) == Some(expected))
            })
            .cloned()
            .collect()
    }
}

impl StoreClient for MemoryStore {
    async fn get(&self, collection: &str, filter: &Filter) -> Result<QueryResult, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard::enter(self);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        Ok(QueryResult {
            rows: self.matching_rows(collection, filter),
        })
    }
}

/// Counts one query as in progress until dropped, including when a timed
/// out probe cancels it mid-sleep.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(store: &'a MemoryStore) -> Self {
        let now = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            in_flight: &store.in_flight,
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
