//! Runtime configuration for timeline core callers.
//!
//! # Responsibility
//! - Resolve database path, lock timeout, category policy and logging options
//!   from `TIMELINE_*` environment variables.
//! - Keep env parsing out of the service and repository layers.
//!
//! # Invariants
//! - Unset or empty variables fall back to documented defaults; malformed
//!   values are rejected instead of silently defaulted.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::logging::default_log_level;
use serde::{Deserialize, Deserializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "TIMELINE";
pub const ENV_DB_PATH: &str = "TIMELINE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "TIMELINE_BUSY_TIMEOUT_MS";
pub const ENV_CATEGORY_POLICY: &str = "TIMELINE_CATEGORY_POLICY";
pub const ENV_LOG_LEVEL: &str = "TIMELINE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TIMELINE_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "timeline.sqlite3";

/// Whether an event may be persisted without any category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum CategoryPolicy {
    /// Every create/update must name at least one category.
    #[default]
    RequireAtLeastOne,
    /// Zero categories is a valid association set.
    AllowEmpty,
}

impl CategoryPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequireAtLeastOne => "require_one",
            Self::AllowEmpty => "allow_empty",
        }
    }
}

impl FromStr for CategoryPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "require_one" | "require_at_least_one" => Ok(Self::RequireAtLeastOne),
            "allow_empty" => Ok(Self::AllowEmpty),
            other => Err(ConfigError::InvalidValue {
                key: ENV_CATEGORY_POLICY,
                value: other.to_string(),
                reason: "expected require_one|allow_empty",
            }),
        }
    }
}

impl TryFrom<String> for CategoryPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// A value was read but does not name a supported option.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    /// The environment source could not be collected or deserialized.
    Source(::config::ConfigError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
            Self::Source(err) => write!(f, "invalid {ENV_PREFIX}_* configuration: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidValue { .. } => None,
            Self::Source(err) => Some(err),
        }
    }
}

impl From<::config::ConfigError> for ConfigError {
    fn from(value: ::config::ConfigError) -> Self {
        Self::Source(value)
    }
}

/// Resolved core configuration.
///
/// Field names are the variable names without the `TIMELINE_` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Bound on waiting for the database write lock.
    #[serde(
        rename = "busy_timeout_ms",
        default = "default_busy_timeout",
        deserialize_with = "deserialize_millis"
    )]
    pub busy_timeout: Duration,
    #[serde(default)]
    pub category_policy: CategoryPolicy,
    #[serde(default = "default_level")]
    pub log_level: String,
    /// Logging stays off when `None`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

fn default_busy_timeout() -> Duration {
    DEFAULT_BUSY_TIMEOUT
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout: default_busy_timeout(),
            category_policy: CategoryPolicy::default(),
            log_level: default_level(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from explicit `TIMELINE_*` pairs instead of the
    /// process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<::config::Map<String, String>>();
        Self::load(Some(vars))
    }

    fn load(vars: Option<::config::Map<String, String>>) -> Result<Self, ConfigError> {
        let environment = ::config::Environment::with_prefix(ENV_PREFIX)
            .ignore_empty(true)
            .source(vars);
        let config = ::config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryPolicy, ConfigError, CoreConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CoreConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.category_policy, CategoryPolicy::RequireAtLeastOne);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = CoreConfig::from_vars([
            ("TIMELINE_DB_PATH", "/var/lib/timeline/db.sqlite3"),
            ("TIMELINE_BUSY_TIMEOUT_MS", "250"),
            ("TIMELINE_CATEGORY_POLICY", "ALLOW_EMPTY"),
            ("TIMELINE_LOG_LEVEL", "warn"),
            ("TIMELINE_LOG_DIR", "/var/log/timeline"),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/timeline/db.sqlite3"));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.category_policy, CategoryPolicy::AllowEmpty);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/timeline")));
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let config = CoreConfig::from_vars([("TIMELINE_DB_PATH", "")]).unwrap();
        assert_eq!(config.db_path, CoreConfig::default().db_path);
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let config = CoreConfig::from_vars([
            ("HOME", "/root"),
            ("TIMELINE_UNKNOWN_KNOB", "1"),
        ])
        .unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let err = CoreConfig::from_vars([("TIMELINE_BUSY_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Source(_)));
    }

    #[test]
    fn unknown_category_policy_is_rejected() {
        let err = CoreConfig::from_vars([("TIMELINE_CATEGORY_POLICY", "sometimes")]).unwrap_err();
        assert!(err.to_string().contains("sometimes"));
        assert!("sometimes".parse::<CategoryPolicy>().is_err());
        assert_eq!(
            "require_one".parse::<CategoryPolicy>().unwrap(),
            CategoryPolicy::RequireAtLeastOne
        );
    }
}
