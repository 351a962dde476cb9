//! Rule dispatcher: pure per-field evaluation, no store access.
//!
//! Each field runs an ordered chain of checks (presence, type, pattern,
//! length). The first failing check ends the chain for that field; store
//! probes are only requested once every synchronous check has passed.

use serde_json::Value;

use super::patterns::PatternRegistry;
use super::probe::ProbeRequest;
use super::rules::{
    display_value, effective_length, value_type_tag, ConstraintSet, FieldViolation, LengthRule,
    Record, Schema, ViolationKind,
};
use crate::config::PresenceMode;

/// Result of one check in a field's chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Move on to the next check.
    Continue,
    /// Stop without a violation (absent optional field).
    Skip,
    /// Stop and report.
    Fail(FieldViolation),
}

/// Everything the dispatcher produced for one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOutcome {
    pub violations: Vec<FieldViolation>,
    pub probes: Vec<ProbeRequest>,
}

/// Everything the dispatcher produced for one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub violations: Vec<FieldViolation>,
    pub probes: Vec<ProbeRequest>,
}

/// Inputs shared by the checks after the presence check has passed.
struct FieldContext<'a> {
    field: &'a str,
    value: &'a Value,
    constraints: &'a ConstraintSet,
    patterns: &'a PatternRegistry,
}

type Check = fn(&FieldContext<'_>) -> Step;

/// Synchronous checks run, in order, on a present value.
const CHECKS: [Check; 3] = [check_type, check_pattern, check_length];

/// Run every schema field through the dispatcher.
///
/// Fields absent from the schema are ignored; each schema field is evaluated
/// regardless of how the others fared.
pub fn dispatch_record(
    record: &Record,
    schema: &Schema,
    patterns: &PatternRegistry,
    presence: PresenceMode,
) -> Dispatch {
    let mut dispatch = Dispatch::default();
    for (field, constraints) in schema.fields() {
        let outcome = evaluate_field(field, record.get(field), constraints, patterns, presence);
        dispatch.violations.extend(outcome.violations);
        dispatch.probes.extend(outcome.probes);
    }
    dispatch
}

/// Evaluate one field's constraints against its (possibly absent) value.
pub fn evaluate_field(
    field: &str,
    value: Option<&Value>,
    constraints: &ConstraintSet,
    patterns: &PatternRegistry,
    presence: PresenceMode,
) -> FieldOutcome {
    let value = match check_presence(field, value, constraints, presence) {
        (Step::Continue, Some(value)) => value,
        (Step::Fail(violation), _) => return FieldOutcome::failed(violation),
        _ => return FieldOutcome::default(),
    };

    let ctx = FieldContext {
        field,
        value,
        constraints,
        patterns,
    };
    for check in CHECKS {
        if let Step::Fail(violation) = check(&ctx) {
            tracing::trace!(field, kind = %violation.kind, "Field failed synchronous check");
            return FieldOutcome::failed(violation);
        }
    }

    FieldOutcome {
        violations: Vec::new(),
        probes: probes_for(field, value, constraints),
    }
}

impl FieldOutcome {
    fn failed(violation: FieldViolation) -> Self {
        Self {
            violations: vec![violation],
            probes: Vec::new(),
        }
    }
}

/// Whether `value` counts as absent under `mode`.
pub fn is_absent(value: Option<&Value>, mode: PresenceMode) -> bool {
    match (value, mode) {
        (None | Some(Value::Null), _) => true,
        (Some(v), PresenceMode::Falsy) => match v {
            Value::Bool(b) => !b,
            Value::String(s) => s.is_empty(),
            Value::Number(n) => n.as_f64() == Some(0.0),
            _ => false,
        },
        (Some(_), PresenceMode::Strict) => false,
    }
}

fn check_presence<'a>(
    field: &str,
    value: Option<&'a Value>,
    constraints: &ConstraintSet,
    mode: PresenceMode,
) -> (Step, Option<&'a Value>) {
    if !is_absent(value, mode) {
        return (Step::Continue, value);
    }
    if constraints.required {
        let mut violation = FieldViolation::new(
            field,
            ViolationKind::MissingRequiredField,
            format!("Property {field} is required"),
        );
        violation.value = value.cloned();
        return (Step::Fail(violation), None);
    }
    (Step::Skip, None)
}

fn check_type(ctx: &FieldContext<'_>) -> Step {
    let Some(expected) = ctx.constraints.value_type.as_deref() else {
        return Step::Continue;
    };
    let actual = value_type_tag(ctx.value);
    if actual == expected {
        return Step::Continue;
    }
    Step::Fail(
        FieldViolation::new(
            ctx.field,
            ViolationKind::TypeMismatch,
            format!(
                "{} is of type {actual}; should be of type {expected}",
                ctx.field
            ),
        )
        .with_value(ctx.value),
    )
}

fn check_pattern(ctx: &FieldContext<'_>) -> Step {
    let Some(name) = ctx.constraints.pattern.as_deref() else {
        return Step::Continue;
    };
    let Some(re) = ctx.patterns.get(name) else {
        return Step::Fail(FieldViolation::new(
            ctx.field,
            ViolationKind::UnknownPattern,
            format!("Pattern {name} does not exist ({})", ctx.field),
        ));
    };
    if re.is_match(&display_value(ctx.value)) {
        return Step::Continue;
    }
    Step::Fail(
        FieldViolation::new(
            ctx.field,
            ViolationKind::PatternMismatch,
            format!("Value of {} does not match pattern {name}", ctx.field),
        )
        .with_value(ctx.value),
    )
}

fn check_length(ctx: &FieldContext<'_>) -> Step {
    let Some(rule) = ctx.constraints.length.as_ref() else {
        return Step::Continue;
    };
    // Unknown kinds stop the chain like any other length failure.
    if let LengthRule::Unknown(_) = rule {
        return Step::Fail(FieldViolation::new(
            ctx.field,
            ViolationKind::UnknownLengthKind,
            rule.failure_message(ctx.field),
        ));
    }
    if rule.admits(effective_length(ctx.value)) {
        return Step::Continue;
    }
    Step::Fail(
        FieldViolation::new(
            ctx.field,
            ViolationKind::LengthOutOfBounds,
            rule.failure_message(ctx.field),
        )
        .with_value(ctx.value),
    )
}

fn probes_for(field: &str, value: &Value, constraints: &ConstraintSet) -> Vec<ProbeRequest> {
    let mut probes = Vec::new();
    if let Some(rule) = &constraints.unique {
        probes.push(ProbeRequest::unique(field, rule, value));
    }
    if let Some(rule) = &constraints.exists {
        probes.push(ProbeRequest::exists(field, rule, value));
    }
    probes
}
