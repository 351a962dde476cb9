//! Named regular expressions referenced by `pattern` constraints.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Built-in patterns, keyed by the name schemas use.
const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("email", r"^[^\s@]+@[^\s@]+\.[^\s@]+$"),
    ("alpha", r"^[A-Za-z]+$"),
    ("alphanumeric", r"^[A-Za-z0-9]+$"),
    ("numeric", r"^-?[0-9]+(\.[0-9]+)?$"),
    ("integer", r"^-?[0-9]+$"),
    ("slug", r"^[a-z0-9]+(?:-[a-z0-9]+)*$"),
    (
        "uuid",
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    ),
    ("url", r"^https?://[^\s/$.?#][^\s]*$"),
    ("phone", r"^\+?[0-9 ()\-]{7,20}$"),
    ("hex_color", r"^#(?:[0-9a-fA-F]{3}){1,2}$"),
    ("zip_code", r"^[0-9]{5}(?:-[0-9]{4})?$"),
    ("username", r"^[A-Za-z0-9_]{3,32}$"),
];

/// Process-wide registry, compiled on first use and never mutated.
static DEFAULT_REGISTRY: LazyLock<PatternRegistry> = LazyLock::new(|| {
    let mut patterns = HashMap::with_capacity(DEFAULT_PATTERNS.len());
    for (name, source) in DEFAULT_PATTERNS {
        patterns.insert(
            (*name).to_string(),
            Regex::new(source).expect("built-in patterns are valid"),
        );
    }
    PatternRegistry { patterns }
});

/// Read-only lookup table from pattern name to compiled regex.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    patterns: HashMap<String, Regex>,
}

impl PatternRegistry {
    /// The shared registry holding the built-in patterns.
    pub fn global() -> &'static PatternRegistry {
        &DEFAULT_REGISTRY
    }

    /// Start an empty registry.
    pub fn builder() -> PatternRegistryBuilder {
        PatternRegistryBuilder::default()
    }

    /// Start from the built-in patterns, to extend or override them.
    pub fn builder_with_defaults() -> PatternRegistryBuilder {
        PatternRegistryBuilder {
            patterns: DEFAULT_REGISTRY.patterns.clone(),
            errors: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Regex> {
        self.patterns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Collects patterns for a custom [`PatternRegistry`].
///
/// Compile errors are deferred to [`PatternRegistryBuilder::build`] so that
/// every bad source is reported at once.
#[derive(Debug, Default)]
pub struct PatternRegistryBuilder {
    patterns: HashMap<String, Regex>,
    errors: Vec<String>,
}

impl PatternRegistryBuilder {
    pub fn pattern(mut self, name: impl Into<String>, source: &str) -> Self {
        let name = name.into();
        match Regex::new(source) {
            Ok(re) => {
                self.patterns.insert(name, re);
            }
            Err(e) => self.errors.push(format!("pattern '{name}': {e}")),
        }
        self
    }

    pub fn build(self) -> Result<PatternRegistry, CoreError> {
        if !self.errors.is_empty() {
            return Err(CoreError::Schema(self.errors.join("; ")));
        }
        Ok(PatternRegistry {
            patterns: self.patterns,
        })
    }
}
