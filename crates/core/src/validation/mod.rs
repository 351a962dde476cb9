//! Record validation engine.
//!
//! Provides schema and rule types, a pure-logic dispatcher, store probes,
//! and the [`validator::Validator`] that ties them together.

pub mod dispatcher;
pub mod patterns;
pub mod probe;
pub mod rules;
pub mod validator;
