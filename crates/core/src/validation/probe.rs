//! Store probes: uniqueness and existence checks that need the backing store.

use std::time::{Duration, Instant};

use serde_json::Value;

use super::rules::{display_value, ExistsRule, FieldViolation, UniqueRule, ViolationKind};
use crate::error::StoreError;
use crate::store::{Filter, QueryResult, StoreClient};

/// What a probe asks the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    /// No row in the collection may carry the field's value under the field's name.
    Unique,
    /// Some row must carry the field's value in `column`.
    Exists { column: String },
}

/// A deferred store check produced by the dispatcher for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub field: String,
    pub collection: String,
    pub value: Value,
    pub kind: ProbeKind,
}

/// How a single probe settled.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Passed,
    Violated(FieldViolation),
    Failed(StoreError),
}

impl ProbeRequest {
    pub fn unique(field: &str, rule: &UniqueRule, value: &Value) -> Self {
        Self {
            field: field.to_string(),
            collection: rule.collection.clone(),
            value: value.clone(),
            kind: ProbeKind::Unique,
        }
    }

    pub fn exists(field: &str, rule: &ExistsRule, value: &Value) -> Self {
        Self {
            field: field.to_string(),
            collection: rule.collection.clone(),
            value: value.clone(),
            kind: ProbeKind::Exists {
                column: rule.column.clone(),
            },
        }
    }

    /// The equality filter sent to the store.
    pub fn filter(&self) -> Filter {
        let column = match &self.kind {
            ProbeKind::Unique => &self.field,
            ProbeKind::Exists { column } => column,
        };
        let mut filter = Filter::new();
        filter.insert(column.clone(), self.value.clone());
        filter
    }

    /// Turn the store's answer into a verdict.
    pub fn interpret(&self, result: &QueryResult) -> Option<FieldViolation> {
        match &self.kind {
            ProbeKind::Unique if !result.is_empty() => Some(
                FieldViolation::new(
                    &self.field,
                    ViolationKind::UniquenessViolation,
                    format!(
                        "{} with value {} already exists",
                        self.field,
                        display_value(&self.value)
                    ),
                )
                .with_value(&self.value),
            ),
            ProbeKind::Exists { column } if result.is_empty() => Some(
                FieldViolation::new(
                    &self.field,
                    ViolationKind::ExistenceViolation,
                    format!(
                        "{column} in {} with value {} doesnt exist",
                        self.collection,
                        display_value(&self.value)
                    ),
                )
                .with_value(&self.value),
            ),
            _ => None,
        }
    }

    /// Violation recorded when the store could not answer.
    pub fn failure_violation(&self, error: &StoreError) -> FieldViolation {
        let violation = match error {
            StoreError::Timeout { elapsed_ms } => FieldViolation::new(
                &self.field,
                ViolationKind::ProbeTimedOut,
                format!("Store probe for {} timed out after {elapsed_ms}ms", self.field),
            ),
            other => FieldViolation::new(
                &self.field,
                ViolationKind::StoreProbeFailed,
                format!("Store probe for {} failed: {other}", self.field),
            ),
        };
        violation.with_value(&self.value)
    }
}

/// Issue `request` against `store`, giving up after `timeout`.
pub async fn run_probe<S: StoreClient>(
    store: &S,
    request: &ProbeRequest,
    timeout: Duration,
) -> ProbeOutcome {
    let start = Instant::now();
    let filter = request.filter();

    tracing::trace!(
        field = %request.field,
        collection = %request.collection,
        "Issuing store probe"
    );

    match tokio::time::timeout(timeout, store.get(&request.collection, &filter)).await {
        Ok(Ok(result)) => match request.interpret(&result) {
            Some(violation) => ProbeOutcome::Violated(violation),
            None => ProbeOutcome::Passed,
        },
        Ok(Err(err)) => {
            tracing::warn!(
                field = %request.field,
                collection = %request.collection,
                error = %err,
                "Store probe failed"
            );
            ProbeOutcome::Failed(err)
        }
        Err(_elapsed) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::warn!(
                field = %request.field,
                collection = %request.collection,
                elapsed_ms,
                "Store probe timed out"
            );
            ProbeOutcome::Failed(StoreError::Timeout { elapsed_ms })
        }
    }
}
