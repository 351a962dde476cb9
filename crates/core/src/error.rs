/// Failures talking to the backing store.
///
/// These never describe a constraint violation; a probe that reaches the
/// store and gets an answer reports through [`crate::validation::rules::FieldViolation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store probe timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_into_core_error() {
        let err: CoreError = StoreError::Unavailable("connection refused".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Store error: Store unavailable: connection refused"
        );
    }

    #[test]
    fn timeout_display_includes_elapsed() {
        let err = StoreError::Timeout { elapsed_ms: 250 };
        assert_eq!(err.to_string(), "Store probe timed out after 250ms");
    }
}
