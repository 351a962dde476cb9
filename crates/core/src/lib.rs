pub mod config;
pub mod error;
pub mod store;
pub mod validation;

pub use config::{PresenceMode, StoreFailurePolicy, ValidatorConfig};
pub use error::{CoreError, StoreError};
pub use store::{Filter, MemoryStore, QueryResult, StoreClient};
pub use validation::patterns::PatternRegistry;
pub use validation::rules::{
    ConstraintSet, FieldViolation, LengthRule, Record, Schema, ValidationResult, ViolationKind,
};
pub use validation::validator::Validator;
