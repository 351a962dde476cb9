//! PostgreSQL-backed [`StoreClient`].
//!
//! Collections map to tables (optionally schema-qualified). Filters compare
//! each column through `to_jsonb(row)`, so the JSON value from the record is
//! matched against the column without knowing its SQL type up front.

use std::sync::LazyLock;

use fieldguard_core::{Filter, QueryResult, StoreClient, StoreError};
use regex::Regex;
use serde_json::Value;
use sqlx::types::Json;

use crate::DbPool;

/// Allowed shape for one identifier segment.
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Answers store probes with queries against a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    row_limit: Option<u32>,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            row_limit: None,
        }
    }

    /// Cap the rows fetched per query. Probes only need to know whether a
    /// match exists, so `1` is enough for them.
    pub fn with_row_limit(mut self, limit: u32) -> Self {
        self.row_limit = Some(limit);
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl StoreClient for PgStore {
    async fn get(&self, collection: &str, filter: &Filter) -> Result<QueryResult, StoreError> {
        let sql = build_select(collection, filter.len(), self.row_limit)?;

        let mut query = sqlx::query_scalar::<_, Json<Value>>(&sql);
        for (column, value) in filter {
            query = query.bind(column.as_str()).bind(Json(value));
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;

        tracing::debug!(collection, rows = rows.len(), "Store probe query");

        Ok(QueryResult {
            rows: rows.into_iter().map(|Json(row)| row).collect(),
        })
    }
}

/// Quote a possibly schema-qualified table name (`schema.table`).
pub fn quote_identifier(name: &str) -> Result<String, StoreError> {
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() > 2 || segments.iter().any(|s| !IDENTIFIER_RE.is_match(s)) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(segments
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join("."))
}

/// Build the probe query for `collection` with `filter_len` equality terms.
///
/// Each term binds two parameters: the column name and its JSON value.
pub fn build_select(
    collection: &str,
    filter_len: usize,
    row_limit: Option<u32>,
) -> Result<String, StoreError> {
    let table = quote_identifier(collection)?;
    let mut sql = format!("SELECT to_jsonb(t) FROM {table} t");

    let terms: Vec<String> = (0..filter_len)
        .map(|i| format!("to_jsonb(t) -> ${} = ${}", 2 * i + 1, 2 * i + 2))
        .collect();
    if !terms.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&terms.join(" AND "));
    }
    if let Some(limit) = row_limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(sql)
}

/// Map a sqlx error onto the store error the validator understands.
///
/// Connectivity problems become `Unavailable`; everything else is a failed
/// query.
fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => {
            tracing::error!(error = %other, "Store query failed");
            StoreError::Query(other.to_string())
        }
    }
}
