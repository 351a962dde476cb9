//! Validation entry point: dispatches every field, fans out store probes,
//! and merges everything into one [`ValidationResult`].

use std::borrow::Cow;

use futures::stream::{self, StreamExt, TryStreamExt};

use super::dispatcher::{dispatch_record, Dispatch};
use super::patterns::PatternRegistry;
use super::probe::{run_probe, ProbeOutcome, ProbeRequest};
use super::rules::{FieldViolation, Record, Schema, ValidationResult};
use crate::config::{StoreFailurePolicy, ValidatorConfig};
use crate::error::CoreError;
use crate::store::StoreClient;

/// Validates records against schemas, consulting `S` for store-backed rules.
///
/// Holds no per-call state, so one validator can serve concurrent calls.
pub struct Validator<S> {
    store: S,
    patterns: Cow<'static, PatternRegistry>,
    config: ValidatorConfig,
}

impl<S: StoreClient> Validator<S> {
    /// A validator using the built-in patterns and default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            patterns: Cow::Borrowed(PatternRegistry::global()),
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the built-in pattern registry.
    pub fn with_patterns(mut self, patterns: PatternRegistry) -> Self {
        self.patterns = Cow::Owned(patterns);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate `record` against `schema`.
    ///
    /// Synchronous violations come first, in field-then-rule order; probe
    /// violations follow in completion order. Returns `Err` only when a store
    /// failure occurs under [`StoreFailurePolicy::Abort`].
    pub async fn validate(
        &self,
        record: &Record,
        schema: &Schema,
    ) -> Result<ValidationResult, CoreError> {
        let Dispatch {
            mut violations,
            probes,
        } = dispatch_record(record, schema, &self.patterns, self.config.presence_mode);

        tracing::debug!(
            fields = schema.len(),
            sync_violations = violations.len(),
            pending_probes = probes.len(),
            "Dispatched record"
        );

        if !probes.is_empty() {
            // Requests are moved into the stream so the future stays `Send`.
            let settled: Vec<Option<FieldViolation>> = stream::iter(probes)
                .map(|request| async move { self.settle(&request).await })
                .buffer_unordered(self.config.max_concurrent_probes.max(1))
                .try_collect()
                .await
                .inspect_err(|err| {
                    tracing::warn!(error = %err, "Validation aborted by store failure");
                })?;
            violations.extend(settled.into_iter().flatten());
        }

        let result = ValidationResult::from_violations(violations);
        tracing::debug!(
            is_valid = result.is_valid,
            violations = result.errors.len(),
            "Validation resolved"
        );
        Ok(result)
    }

    /// Run one probe and apply the store failure policy to its outcome.
    async fn settle(&self, request: &ProbeRequest) -> Result<Option<FieldViolation>, CoreError> {
        match run_probe(&self.store, request, self.config.probe_timeout).await {
            ProbeOutcome::Passed => Ok(None),
            ProbeOutcome::Violated(violation) => Ok(Some(violation)),
            ProbeOutcome::Failed(err) => match self.config.store_failure_policy {
                StoreFailurePolicy::Collect => Ok(Some(request.failure_violation(&err))),
                StoreFailurePolicy::Abort => Err(CoreError::Store(err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::validation::rules::{ConstraintSet, ViolationKind};

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn store_free_schema_never_queries() {
        let validator = Validator::new(MemoryStore::new());
        let schema = Schema::new().field("name", ConstraintSet::new().required().of_type("string"));

        let result = validator.validate(&record(json!({"name": 7})), &schema).await.unwrap();
        assert_eq!(result.count_of(ViolationKind::TypeMismatch), 1);
        assert_eq!(validator.store().query_count(), 0);
    }

    #[tokio::test]
    async fn failing_sync_checks_suppress_probes() {
        let validator = Validator::new(MemoryStore::new());
        let schema = Schema::new().field(
            "email",
            ConstraintSet::new().pattern("email").unique_in("users"),
        );

        let result = validator
            .validate(&record(json!({"email": "nope"})), &schema)
            .await
            .unwrap();
        assert_eq!(result.count_of(ViolationKind::PatternMismatch), 1);
        assert_eq!(validator.store().query_count(), 0);
    }

    #[tokio::test]
    async fn custom_patterns_replace_builtins() {
        let patterns = PatternRegistry::builder()
            .pattern("ticket", r"^TCK-[0-9]+$")
            .build()
            .unwrap();
        let validator = Validator::new(MemoryStore::new()).with_patterns(patterns);
        let schema = Schema::new()
            .field("ticket", ConstraintSet::new().pattern("ticket"))
            .field("email", ConstraintSet::new().pattern("email"));

        let result = validator
            .validate(&record(json!({"ticket": "TCK-12", "email": "a@b.com"})), &schema)
            .await
            .unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ViolationKind::UnknownPattern);
        assert_eq!(result.errors[0].field, "email");
    }
}
