//! Engine configuration: loading, merging and validation.
//!
//! Settings come from environment variables or a TOML file. Both are
//! parsed into a [`RawConfig`] of optional fields; environment values win
//! over file values. [`RawConfig::validate`] turns the merged result into
//! the immutable [`ClusterConfig`] handed to every component, or fails
//! with a [`ConfigError`] before any external call is made.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ModeKind;

pub const ENV_CLUSTER_IDENTIFIER: &str = "CLUSTER_IDENTIFIER";
pub const ENV_MIN_CAPACITY: &str = "MIN_CAPACITY";
pub const ENV_MAX_CAPACITY: &str = "MAX_CAPACITY";
pub const ENV_SCHEDULED_SCALING: &str = "SCHEDULED_SCALING";
pub const ENV_SCHEDULE_NUMBER_REPLICAS: &str = "SCHEDULE_NUMBER_REPLICAS";
pub const ENV_METRIC_NAME: &str = "METRIC_NAME";
pub const ENV_TARGET_VALUE: &str = "TARGET_VALUE";
pub const ENV_DRYRUN: &str = "DRYRUN";
pub const ENV_INSTANCE_TYPE: &str = "INSTANCE_TYPE";
pub const ENV_MAX_RETRIES: &str = "MAX_RETRIES";
pub const ENV_INITIAL_BACKOFF: &str = "INITIAL_BACKOFF";
pub const ENV_NOTIFY_URL: &str = "NOTIFY_URL";

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 1;
const BACKOFF_MULTIPLIER: u32 = 2;
const MAX_BACKOFF: Duration = Duration::from_secs(32);

// ── Validated config ──────────────────────────────────────────────

/// Immutable per-invocation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub cluster_id: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub mode: ScalingMode,
    pub dry_run: bool,
    /// Explicit instance class for new readers; the writer's class otherwise.
    pub instance_class: Option<String>,
    pub retry: RetryPolicy,
    /// Webhook destination for notifications.
    pub notify_url: Option<String>,
}

/// The two closed scaling strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingMode {
    Metric(MetricModeConfig),
    Scheduled(ScheduleModeConfig),
}

impl ScalingMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            ScalingMode::Metric(_) => ModeKind::Metric,
            ScalingMode::Scheduled(_) => ModeKind::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricModeConfig {
    pub metric_name: String,
    /// Per-reader utilization target. Always > 0.
    pub target_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleModeConfig {
    /// Signed replica delta: positive adds, negative removes.
    pub replica_delta: i32,
}

/// Bounded exponential backoff for the retrying executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            multiplier: BACKOFF_MULTIPLIER,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Sleep that follows the `attempt`-th failure (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let mut backoff = self.initial_backoff;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(self.multiplier);
            if backoff >= self.max_backoff {
                return self.max_backoff;
            }
        }
        backoff.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(DEFAULT_INITIAL_BACKOFF_SECS),
        )
    }
}

impl ClusterConfig {
    /// Copy of this config with the scheduled delta replaced for one
    /// command. Metric mode has no delta and is returned unchanged.
    pub fn with_replica_override(&self, replicas: i32) -> Self {
        let mut config = self.clone();
        if let ScalingMode::Scheduled(schedule) = &mut config.mode {
            schedule.replica_delta = replicas;
        }
        config
    }

    /// Load from the process environment, layered over an optional file.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => RawConfig::from_file(path)?,
            None => RawConfig::default(),
        };
        let env = RawConfig::from_lookup(|key| std::env::var(key).ok())?;
        base.merge(env).validate()
    }
}

// ── Raw (unvalidated) config ──────────────────────────────────────

/// Optional settings as read from one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub cluster_identifier: Option<String>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub scheduled_scaling: Option<bool>,
    pub schedule_number_replicas: Option<i32>,
    pub metric_name: Option<String>,
    pub target_value: Option<f64>,
    pub dry_run: Option<bool>,
    pub instance_type: Option<String>,
    pub max_retries: Option<u32>,
    /// Seconds.
    pub initial_backoff: Option<u64>,
    pub notify_url: Option<String>,
}

impl RawConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::File(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::File(e.to_string()))
    }

    /// Read settings through `lookup` (normally `std::env::var`). Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            cluster_identifier: get(ENV_CLUSTER_IDENTIFIER),
            min_capacity: parse_opt(ENV_MIN_CAPACITY, get(ENV_MIN_CAPACITY))?,
            max_capacity: parse_opt(ENV_MAX_CAPACITY, get(ENV_MAX_CAPACITY))?,
            scheduled_scaling: get(ENV_SCHEDULED_SCALING)
                .map(|v| parse_bool(ENV_SCHEDULED_SCALING, &v))
                .transpose()?,
            schedule_number_replicas: parse_opt(
                ENV_SCHEDULE_NUMBER_REPLICAS,
                get(ENV_SCHEDULE_NUMBER_REPLICAS),
            )?,
            metric_name: get(ENV_METRIC_NAME),
            target_value: parse_opt(ENV_TARGET_VALUE, get(ENV_TARGET_VALUE))?,
            dry_run: get(ENV_DRYRUN)
                .map(|v| parse_bool(ENV_DRYRUN, &v))
                .transpose()?,
            instance_type: get(ENV_INSTANCE_TYPE),
            max_retries: parse_opt(ENV_MAX_RETRIES, get(ENV_MAX_RETRIES))?,
            initial_backoff: parse_opt(ENV_INITIAL_BACKOFF, get(ENV_INITIAL_BACKOFF))?,
            notify_url: get(ENV_NOTIFY_URL),
        })
    }

    /// Overlay `other` on top of `self`; set fields in `other` win.
    pub fn merge(self, other: RawConfig) -> RawConfig {
        RawConfig {
            cluster_identifier: other.cluster_identifier.or(self.cluster_identifier),
            min_capacity: other.min_capacity.or(self.min_capacity),
            max_capacity: other.max_capacity.or(self.max_capacity),
            scheduled_scaling: other.scheduled_scaling.or(self.scheduled_scaling),
            schedule_number_replicas: other
                .schedule_number_replicas
                .or(self.schedule_number_replicas),
            metric_name: other.metric_name.or(self.metric_name),
            target_value: other.target_value.or(self.target_value),
            dry_run: other.dry_run.or(self.dry_run),
            instance_type: other.instance_type.or(self.instance_type),
            max_retries: other.max_retries.or(self.max_retries),
            initial_backoff: other.initial_backoff.or(self.initial_backoff),
            notify_url: other.notify_url.or(self.notify_url),
        }
    }

    /// Check required fields and bounds, producing a [`ClusterConfig`].
    pub fn validate(self) -> Result<ClusterConfig, ConfigError> {
        let cluster_id = self
            .cluster_identifier
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_CLUSTER_IDENTIFIER))?;
        let min_capacity = self
            .min_capacity
            .ok_or(ConfigError::Missing(ENV_MIN_CAPACITY))?;
        let max_capacity = self
            .max_capacity
            .ok_or(ConfigError::Missing(ENV_MAX_CAPACITY))?;
        if min_capacity > max_capacity {
            return Err(ConfigError::invalid(
                ENV_MIN_CAPACITY,
                min_capacity.to_string(),
                format!("exceeds {ENV_MAX_CAPACITY} ({max_capacity})"),
            ));
        }

        let mode = if self.scheduled_scaling.unwrap_or(false) {
            let replica_delta = self
                .schedule_number_replicas
                .ok_or(ConfigError::Missing(ENV_SCHEDULE_NUMBER_REPLICAS))?;
            ScalingMode::Scheduled(ScheduleModeConfig { replica_delta })
        } else {
            let metric_name = self
                .metric_name
                .filter(|s| !s.trim().is_empty())
                .ok_or(ConfigError::Missing(ENV_METRIC_NAME))?;
            let target_value = self
                .target_value
                .ok_or(ConfigError::Missing(ENV_TARGET_VALUE))?;
            if !target_value.is_finite() || target_value <= 0.0 {
                return Err(ConfigError::invalid(
                    ENV_TARGET_VALUE,
                    target_value.to_string(),
                    "must be a finite number greater than zero",
                ));
            }
            ScalingMode::Metric(MetricModeConfig {
                metric_name,
                target_value,
            })
        };

        let max_attempts = self.max_retries.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::invalid(
                ENV_MAX_RETRIES,
                "0",
                "at least one attempt is required",
            ));
        }
        let backoff_secs = self
            .initial_backoff
            .unwrap_or(DEFAULT_INITIAL_BACKOFF_SECS);
        if backoff_secs == 0 {
            return Err(ConfigError::invalid(
                ENV_INITIAL_BACKOFF,
                "0",
                "must be greater than zero",
            ));
        }

        Ok(ClusterConfig {
            cluster_id,
            min_capacity,
            max_capacity,
            mode,
            dry_run: self.dry_run.unwrap_or(false),
            instance_class: self.instance_type.filter(|s| !s.trim().is_empty()),
            retry: RetryPolicy::new(max_attempts, Duration::from_secs(backoff_secs)),
            notify_url: self.notify_url.filter(|s| !s.trim().is_empty()),
        })
    }
}

fn parse_opt<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, v.clone(), e))
        })
        .transpose()
}

/// Boolean parsing with the same accepted spellings as Go's `ParseBool`.
fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(ConfigError::invalid(key, other, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn metric_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_CLUSTER_IDENTIFIER, "orders"),
            (ENV_MIN_CAPACITY, "1"),
            (ENV_MAX_CAPACITY, "5"),
            (ENV_METRIC_NAME, "CPUUtilization"),
            (ENV_TARGET_VALUE, "50"),
        ]
    }

    #[test]
    fn metric_mode_from_env() {
        let config = RawConfig::from_lookup(lookup(&metric_env()))
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(config.cluster_id, "orders");
        assert_eq!(config.min_capacity, 1);
        assert_eq!(config.max_capacity, 5);
        assert!(!config.dry_run);
        assert_eq!(config.instance_class, None);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(
            config.mode,
            ScalingMode::Metric(MetricModeConfig {
                metric_name: "CPUUtilization".into(),
                target_value: 50.0,
            })
        );
    }

    #[test]
    fn scheduled_mode_requires_replicas() {
        let mut env = metric_env();
        env.push((ENV_SCHEDULED_SCALING, "true"));
        let err = RawConfig::from_lookup(lookup(&env))
            .unwrap()
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_SCHEDULE_NUMBER_REPLICAS));

        env.push((ENV_SCHEDULE_NUMBER_REPLICAS, "-2"));
        let config = RawConfig::from_lookup(lookup(&env))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(
            config.mode,
            ScalingMode::Scheduled(ScheduleModeConfig { replica_delta: -2 })
        );
    }

    #[test]
    fn scheduled_mode_does_not_need_metric_settings() {
        let env = [
            (ENV_CLUSTER_IDENTIFIER, "orders"),
            (ENV_MIN_CAPACITY, "0"),
            (ENV_MAX_CAPACITY, "3"),
            (ENV_SCHEDULED_SCALING, "1"),
            (ENV_SCHEDULE_NUMBER_REPLICAS, "2"),
        ];
        let config = RawConfig::from_lookup(lookup(&env))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(config.mode.kind(), ModeKind::Scheduled);
    }

    #[test]
    fn missing_required_fields() {
        let err = RawConfig::default().validate().unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_CLUSTER_IDENTIFIER));

        let env = [(ENV_CLUSTER_IDENTIFIER, "orders"), (ENV_MIN_CAPACITY, "1")];
        let err = RawConfig::from_lookup(lookup(&env))
            .unwrap()
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_MAX_CAPACITY));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let env = [(ENV_MIN_CAPACITY, "one")];
        assert!(matches!(
            RawConfig::from_lookup(lookup(&env)),
            Err(ConfigError::Invalid { key: ENV_MIN_CAPACITY, .. })
        ));

        let env = [(ENV_DRYRUN, "yes")];
        assert!(matches!(
            RawConfig::from_lookup(lookup(&env)),
            Err(ConfigError::Invalid { key: ENV_DRYRUN, .. })
        ));
    }

    #[test]
    fn bounds_are_validated() {
        let mut env = metric_env();
        env.retain(|(k, _)| *k != ENV_MIN_CAPACITY);
        env.push((ENV_MIN_CAPACITY, "6"));
        assert!(matches!(
            RawConfig::from_lookup(lookup(&env)).unwrap().validate(),
            Err(ConfigError::Invalid { key: ENV_MIN_CAPACITY, .. })
        ));

        let mut env = metric_env();
        env.retain(|(k, _)| *k != ENV_TARGET_VALUE);
        env.push((ENV_TARGET_VALUE, "0"));
        assert!(matches!(
            RawConfig::from_lookup(lookup(&env)).unwrap().validate(),
            Err(ConfigError::Invalid { key: ENV_TARGET_VALUE, .. })
        ));

        let mut env = metric_env();
        env.push((ENV_MAX_RETRIES, "0"));
        assert!(matches!(
            RawConfig::from_lookup(lookup(&env)).unwrap().validate(),
            Err(ConfigError::Invalid { key: ENV_MAX_RETRIES, .. })
        ));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let mut env = metric_env();
        env.push((ENV_INSTANCE_TYPE, ""));
        env.push((ENV_DRYRUN, ""));
        let config = RawConfig::from_lookup(lookup(&env))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(config.instance_class, None);
        assert!(!config.dry_run);
    }

    #[test]
    fn env_overrides_file() {
        let file = RawConfig::from_toml_str(
            r#"
cluster_identifier = "from-file"
min_capacity = 1
max_capacity = 4
metric_name = "CPUUtilization"
target_value = 60.0
dry_run = true
"#,
        )
        .unwrap();
        let env = RawConfig::from_lookup(lookup(&[(ENV_CLUSTER_IDENTIFIER, "from-env")])).unwrap();

        let config = file.merge(env).validate().unwrap();
        assert_eq!(config.cluster_id, "from-env");
        assert_eq!(config.max_capacity, 4);
        assert!(config.dry_run);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(RawConfig::from_toml_str("cluster = \"x\"").is_err());
    }

    #[test]
    fn replica_override_only_touches_scheduled_mode() {
        let metric = RawConfig::from_lookup(lookup(&metric_env()))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(metric.with_replica_override(3), metric);

        let mut env = metric_env();
        env.push((ENV_SCHEDULED_SCALING, "true"));
        env.push((ENV_SCHEDULE_NUMBER_REPLICAS, "1"));
        let scheduled = RawConfig::from_lookup(lookup(&env))
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(
            scheduled.with_replica_override(4).mode,
            ScalingMode::Scheduled(ScheduleModeConfig { replica_delta: 4 })
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1));
        let waits: Vec<u64> = (1..=8).map(|a| policy.backoff_after(a).as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 16, 32, 32, 32]);

        let policy = RetryPolicy::new(3, Duration::from_secs(40));
        assert_eq!(policy.backoff_after(1), Duration::from_secs(32));
    }
}
