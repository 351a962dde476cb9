use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Default per-probe timeout in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Default cap on store probes in flight for one validation call.
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 16;

/// How the presence check decides a field is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceMode {
    /// Absent means the key is missing or the value is `null`.
    #[default]
    Strict,
    /// Also treat `""`, `0` and `false` as absent.
    Falsy,
}

impl FromStr for PresenceMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "falsy" => Ok(Self::Falsy),
            other => Err(CoreError::Config(format!(
                "unknown presence mode '{other}' (expected 'strict' or 'falsy')"
            ))),
        }
    }
}

/// What a store communication failure does to the validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailurePolicy {
    /// Record a `StoreProbeFailed` violation and keep every other result.
    #[default]
    Collect,
    /// Fail the whole call with `CoreError::Store`.
    Abort,
}

impl FromStr for StoreFailurePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collect" => Ok(Self::Collect),
            "abort" => Ok(Self::Abort),
            other => Err(CoreError::Config(format!(
                "unknown store failure policy '{other}' (expected 'collect' or 'abort')"
            ))),
        }
    }
}

/// Validator configuration.
///
/// `Default` is suitable for most callers; [`ValidatorConfig::from_env`]
/// lets deployments override it without code changes.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Upper bound on a single store probe (default: 5s).
    pub probe_timeout: Duration,
    /// Store probes allowed in flight per call (default: `16`, minimum `1`).
    pub max_concurrent_probes: usize,
    pub presence_mode: PresenceMode,
    pub store_failure_policy: StoreFailurePolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
            presence_mode: PresenceMode::default(),
            store_failure_policy: StoreFailurePolicy::default(),
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                              | Default   |
    /// |--------------------------------------|-----------|
    /// | `FIELDGUARD_PROBE_TIMEOUT_MS`        | `5000`    |
    /// | `FIELDGUARD_MAX_CONCURRENT_PROBES`   | `16`      |
    /// | `FIELDGUARD_PRESENCE_MODE`           | `strict`  |
    /// | `FIELDGUARD_STORE_FAILURE_POLICY`    | `collect` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let probe_timeout = match lookup("FIELDGUARD_PROBE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number("FIELDGUARD_PROBE_TIMEOUT_MS", &raw)?),
            None => defaults.probe_timeout,
        };

        let max_concurrent_probes = match lookup("FIELDGUARD_MAX_CONCURRENT_PROBES") {
            Some(raw) => parse_number("FIELDGUARD_MAX_CONCURRENT_PROBES", &raw)?,
            None => defaults.max_concurrent_probes,
        };
        if max_concurrent_probes == 0 {
            return Err(CoreError::Config(
                "FIELDGUARD_MAX_CONCURRENT_PROBES must be at least 1".to_string(),
            ));
        }

        let presence_mode = match lookup("FIELDGUARD_PRESENCE_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.presence_mode,
        };

        let store_failure_policy = match lookup("FIELDGUARD_STORE_FAILURE_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.store_failure_policy,
        };

        Ok(Self {
            probe_timeout,
            max_concurrent_probes,
            presence_mode,
            store_failure_policy,
        })
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = max.max(1);
        self
    }

    pub fn with_presence_mode(mut self, mode: PresenceMode) -> Self {
        self.presence_mode = mode;
        self
    }

    pub fn with_store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.store_failure_policy = policy;
        self
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, CoreError> {
    raw.trim().parse().map_err(|_| {
        CoreError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))
    })
}
