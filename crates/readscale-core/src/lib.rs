//! readscale-core — shared vocabulary of the read-replica autoscaler.
//!
//! Holds the domain types (nodes, tags, decisions, events), the
//! collaborator traits the engine drives, configuration loading and the
//! trigger decoder.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod trigger;
pub mod types;

pub use collaborators::{BoxFuture, Directory, MetricSource, Notifier};
pub use config::{
    ClusterConfig, MetricModeConfig, RawConfig, RetryPolicy, ScalingMode, ScheduleModeConfig,
};
pub use error::{ConfigError, DirectoryError, MetricError, NotifyError, TriggerError};
pub use trigger::{ScalingCommand, Trigger};
pub use types::*;
