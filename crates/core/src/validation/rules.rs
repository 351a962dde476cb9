//! Schema, constraint and result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// A record under validation: field name to arbitrary JSON value.
pub type Record = Map<String, Value>;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Mapping from field name to the constraints declared for it.
///
/// Fields are kept sorted by name so that evaluation order, and therefore
/// the order of synchronous violations, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, ConstraintSet>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the constraints for `name`.
    pub fn field(mut self, name: impl Into<String>, constraints: ConstraintSet) -> Self {
        self.fields.insert(name.into(), constraints);
        self
    }

    /// Parse a schema from its JSON form, e.g.
    /// `{"email": {"required": true, "pattern": "email"}}`.
    pub fn from_json(value: Value) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|e| CoreError::Schema(e.to_string()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ConstraintSet)> {
        self.fields.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn get(&self, name: &str) -> Option<&ConstraintSet> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Rule configuration for one schema field. Unrecognized keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(default)]
    pub required: bool,
    /// Expected runtime type tag (see [`value_type_tag`]).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Name of a pattern in the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<UniqueRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<ExistsRule>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn of_type(mut self, tag: impl Into<String>) -> Self {
        self.value_type = Some(tag.into());
        self
    }

    pub fn pattern(mut self, name: impl Into<String>) -> Self {
        self.pattern = Some(name.into());
        self
    }

    pub fn length(mut self, rule: LengthRule) -> Self {
        self.length = Some(rule);
        self
    }

    pub fn unique_in(mut self, collection: impl Into<String>) -> Self {
        self.unique = Some(UniqueRule {
            collection: collection.into(),
        });
        self
    }

    pub fn exists_in(mut self, collection: impl Into<String>, column: impl Into<String>) -> Self {
        self.exists = Some(ExistsRule {
            collection: collection.into(),
            column: column.into(),
        });
        self
    }

    /// Whether any rule needs a round trip to the store.
    pub fn has_store_rules(&self) -> bool {
        self.unique.is_some() || self.exists.is_some()
    }
}

/// `unique: { in: <collection> }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueRule {
    #[serde(rename = "in")]
    pub collection: String,
}

/// `exists: { in: <collection>, as: <column> }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsRule {
    #[serde(rename = "in")]
    pub collection: String,
    #[serde(rename = "as")]
    pub column: String,
}

// ---------------------------------------------------------------------------
// Length rules
// ---------------------------------------------------------------------------

/// Bound on a value's effective length. All bounds are inclusive.
///
/// Schemas arrive as data, so a kind this crate does not know is kept as
/// [`LengthRule::Unknown`] and reported at validation time instead of failing
/// deserialization.
///
/// The JSON form must hold exactly one key. An empty object (`{}`) or one
/// with several keys is rejected when the schema is parsed, instead of
/// reporting `undefined is not a valid length type` for `{}` or silently
/// using the first key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub enum LengthRule {
    Between(f64, f64),
    Below(f64),
    Above(f64),
    Equals(f64),
    Unknown(String),
}

impl LengthRule {
    pub fn kind(&self) -> &str {
        match self {
            LengthRule::Between(..) => "between",
            LengthRule::Below(_) => "below",
            LengthRule::Above(_) => "above",
            LengthRule::Equals(_) => "equals",
            LengthRule::Unknown(kind) => kind,
        }
    }

    /// Check an effective length against this bound.
    ///
    /// `None` means the value has no length and fails every known kind.
    /// Unknown kinds are not checked here and always return `true`.
    pub fn admits(&self, len: Option<f64>) -> bool {
        match (self, len) {
            (LengthRule::Unknown(_), _) => true,
            (_, None) => false,
            (LengthRule::Between(lo, hi), Some(len)) => *lo <= len && len <= *hi,
            (LengthRule::Below(max), Some(len)) => len <= *max,
            (LengthRule::Above(min), Some(len)) => len >= *min,
            (LengthRule::Equals(n), Some(len)) => len == *n,
        }
    }

    /// Message for a failed bound on `field`.
    pub fn failure_message(&self, field: &str) -> String {
        match self {
            LengthRule::Between(lo, hi) => {
                format!("Length of {field} is not between values {lo} and {hi}")
            }
            LengthRule::Below(n) => format!("Length of {field} is not below {n}"),
            LengthRule::Above(n) => format!("Length of {field} is not above {n}"),
            LengthRule::Equals(n) => format!("Length of {field} is not equal to {n}"),
            LengthRule::Unknown(kind) => format!("{kind} is not a valid length type ({field})"),
        }
    }
}

impl TryFrom<Map<String, Value>> for LengthRule {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "length constraint must have exactly one kind, found {}",
                map.len()
            ));
        }
        let Some((kind, bound)) = map.into_iter().next() else {
            return Err("length constraint is empty".to_string());
        };

        let number = |v: &Value| {
            v.as_f64()
                .ok_or_else(|| format!("length bound for '{kind}' must be a number, got {v}"))
        };

        match kind.as_str() {
            "between" => {
                let pair = bound
                    .as_array()
                    .filter(|a| a.len() == 2)
                    .ok_or_else(|| "length 'between' expects [low, high]".to_string())?;
                let (lo, hi) = (number(&pair[0])?, number(&pair[1])?);
                if lo > hi {
                    return Err(format!("length 'between' bounds out of order: {lo} > {hi}"));
                }
                Ok(LengthRule::Between(lo, hi))
            }
            "below" => Ok(LengthRule::Below(number(&bound)?)),
            "above" => Ok(LengthRule::Above(number(&bound)?)),
            "equals" => Ok(LengthRule::Equals(number(&bound)?)),
            _ => Ok(LengthRule::Unknown(kind.clone())),
        }
    }
}

impl From<LengthRule> for Map<String, Value> {
    fn from(rule: LengthRule) -> Self {
        let mut map = Map::new();
        let (kind, bound) = match rule {
            LengthRule::Between(lo, hi) => ("between".to_string(), serde_json::json!([lo, hi])),
            LengthRule::Below(n) => ("below".to_string(), serde_json::json!(n)),
            LengthRule::Above(n) => ("above".to_string(), serde_json::json!(n)),
            LengthRule::Equals(n) => ("equals".to_string(), serde_json::json!(n)),
            LengthRule::Unknown(kind) => (kind, Value::Null),
        };
        map.insert(kind, bound);
        map
    }
}

/// Effective length of a value: numbers measure as themselves, strings by
/// character count, arrays by element count. Everything else has none.
pub fn effective_length(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        _ => None,
    }
}

/// Runtime type tag compared against a constraint's `type`.
///
/// Arrays get their own `"array"` tag rather than sharing `"object"` the way
/// JavaScript's `typeof` does, so `{"type": "object"}` rejects an array.
/// Likewise a pattern check sees an array as compact JSON (`[1,2]`), not the
/// comma-joined `1,2` a JavaScript string coercion would produce.
pub fn value_type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which rule a violation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingRequiredField,
    TypeMismatch,
    UnknownPattern,
    PatternMismatch,
    LengthOutOfBounds,
    UnknownLengthKind,
    UniquenessViolation,
    ExistenceViolation,
    StoreProbeFailed,
    ProbeTimedOut,
}

impl ViolationKind {
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::MissingRequiredField => "missing_required_field",
            ViolationKind::TypeMismatch => "type_mismatch",
            ViolationKind::UnknownPattern => "unknown_pattern",
            ViolationKind::PatternMismatch => "pattern_mismatch",
            ViolationKind::LengthOutOfBounds => "length_out_of_bounds",
            ViolationKind::UnknownLengthKind => "unknown_length_kind",
            ViolationKind::UniquenessViolation => "uniqueness_violation",
            ViolationKind::ExistenceViolation => "existence_violation",
            ViolationKind::StoreProbeFailed => "store_probe_failed",
            ViolationKind::ProbeTimedOut => "probe_timed_out",
        }
    }

    /// Whether the violation came from a store round trip.
    pub fn is_store_backed(&self) -> bool {
        matches!(
            self,
            ViolationKind::UniquenessViolation
                | ViolationKind::ExistenceViolation
                | ViolationKind::StoreProbeFailed
                | ViolationKind::ProbeTimedOut
        )
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: &Value) -> Self {
        self.value = Some(value.clone());
        self
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregated result of validating one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldViolation>,
}

impl ValidationResult {
    pub fn from_violations(errors: Vec<FieldViolation>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Violations reported for `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldViolation> {
        self.errors.iter().filter(move |v| v.field == field)
    }

    pub fn count_of(&self, kind: ViolationKind) -> usize {
        self.errors.iter().filter(|v| v.kind == kind).count()
    }
}

/// Render a value the way messages show it: strings bare, everything else as
/// compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arrays_are_tagged_apart_from_objects() {
        assert_eq!(value_type_tag(&json!([1, 2])), "array");
        assert_eq!(value_type_tag(&json!({"a": 1})), "object");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn schema_parses_all_constraint_kinds() {
        let schema = Schema::from_json(json!({
            "email": {
                "required": true,
                "type": "string",
                "pattern": "email",
                "length": { "between": [3, 254] },
                "unique": { "in": "users" }
            },
            "roleId": { "exists": { "in": "roles", "as": "id" } }
        }))
        .unwrap();

        assert_eq!(schema.len(), 2);
        let email = schema.get("email").unwrap();
        assert!(email.required);
        assert_eq!(email.value_type.as_deref(), Some("string"));
        assert_eq!(email.pattern.as_deref(), Some("email"));
        assert_eq!(email.length, Some(LengthRule::Between(3.0, 254.0)));
        assert_eq!(email.unique.as_ref().unwrap().collection, "users");

        let role = schema.get("roleId").unwrap();
        let exists = role.exists.as_ref().unwrap();
        assert_eq!(exists.collection, "roles");
        assert_eq!(exists.column, "id");
        assert!(role.has_store_rules());
    }

    #[test]
    fn schema_fields_iterate_in_name_order() {
        let schema = Schema::new()
            .field("zeta", ConstraintSet::new())
            .field("alpha", ConstraintSet::new())
            .field("mid", ConstraintSet::new());
        let names: Vec<&str> = schema.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn unrecognized_constraint_keys_are_ignored() {
        let schema =
            Schema::from_json(json!({ "name": { "required": true, "trim": true } })).unwrap();
        assert!(schema.get("name").unwrap().required);
    }

    #[test]
    fn unknown_length_kind_survives_parsing() {
        let schema = Schema::from_json(json!({ "name": { "length": { "around": 5 } } })).unwrap();
        assert_eq!(
            schema.get("name").unwrap().length,
            Some(LengthRule::Unknown("around".to_string()))
        );
    }

    #[test]
    fn malformed_length_is_a_schema_error() {
        let err = Schema::from_json(json!({ "name": { "length": { "between": [1] } } }));
        assert!(matches!(err, Err(CoreError::Schema(_))));

        let err = Schema::from_json(json!({ "name": { "length": { "below": "ten" } } }));
        assert!(matches!(err, Err(CoreError::Schema(_))));

        let err = Schema::from_json(json!({ "name": { "length": {} } }));
        assert!(matches!(err, Err(CoreError::Schema(_))));

        let err = Schema::from_json(json!({ "name": { "length": { "below": 3, "above": 1 } } }));
        assert!(matches!(err, Err(CoreError::Schema(_))));

        let err = Schema::from_json(json!({ "name": { "length": { "between": [9, 1] } } }));
        assert!(matches!(err, Err(CoreError::Schema(_))));
    }

    #[test]
    fn between_is_inclusive() {
        let rule = LengthRule::Between(3.0, 5.0);
        assert!(!rule.admits(Some(2.0)));
        assert!(rule.admits(Some(3.0)));
        assert!(rule.admits(Some(5.0)));
        assert!(!rule.admits(Some(6.0)));
    }

    #[test]
    fn missing_length_fails_known_kinds() {
        assert!(!LengthRule::Below(10.0).admits(None));
        assert!(!LengthRule::Equals(0.0).admits(None));
        assert!(LengthRule::Unknown("odd".into()).admits(None));
    }

    #[test]
    fn effective_length_by_type() {
        assert_eq!(effective_length(&json!("héllo")), Some(5.0));
        assert_eq!(effective_length(&json!(42)), Some(42.0));
        assert_eq!(effective_length(&json!([1, 2, 3])), Some(3.0));
        assert_eq!(effective_length(&json!(true)), None);
        assert_eq!(effective_length(&json!({"a": 1})), None);
    }

    #[test]
    fn failure_messages_render_whole_numbers_plainly() {
        assert_eq!(
            LengthRule::Between(3.0, 10.0).failure_message("name"),
            "Length of name is not between values 3 and 10"
        );
        assert_eq!(
            LengthRule::Equals(4.0).failure_message("pin"),
            "Length of pin is not equal to 4"
        );
    }

    #[test]
    fn length_rule_serializes_back_to_single_key() {
        let value = serde_json::to_value(LengthRule::Below(8.0)).unwrap();
        assert_eq!(value, json!({ "below": 8.0 }));
    }

    #[test]
    fn result_validity_tracks_errors() {
        assert!(ValidationResult::from_violations(vec![]).is_valid);
        let result = ValidationResult::from_violations(vec![FieldViolation::new(
            "a",
            ViolationKind::TypeMismatch,
            "a is of type number; should be of type string",
        )]);
        assert!(!result.is_valid);
        assert_eq!(result.count_of(ViolationKind::TypeMismatch), 1);
        assert_eq!(result.for_field("a").count(), 1);
    }

    #[test]
    fn violation_kind_codes_are_snake_case() {
        assert_eq!(ViolationKind::MissingRequiredField.code(), "missing_required_field");
        assert_eq!(
            serde_json::to_value(ViolationKind::ProbeTimedOut).unwrap(),
            json!("probe_timed_out")
        );
        assert!(ViolationKind::StoreProbeFailed.is_store_backed());
        assert!(!ViolationKind::PatternMismatch.is_store_backed());
    }
}
