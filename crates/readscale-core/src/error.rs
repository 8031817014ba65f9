//! Error taxonomy for the reconciliation engine and its collaborators.

use thiserror::Error;

/// A required setting is missing or unparsable. Fatal, never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file: {0}")]
    File(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Any failure reported by the cluster/instance directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("failed to list nodes: {0}")]
    Inventory(String),

    #[error("failed to describe cluster membership: {0}")]
    Membership(String),

    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("failed to create node {node_id}: {reason}")]
    Create { node_id: String, reason: String },

    #[error("failed to delete node {node_id}: {reason}")]
    Delete { node_id: String, reason: String },

    #[error("failed to list tags for {resource}: {reason}")]
    ListTags { resource: String, reason: String },

    #[error("failed to tag {resource}: {reason}")]
    AddTags { resource: String, reason: String },
}

/// Failure while sampling the utilization metric.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricError {
    #[error("no reader instances found")]
    NoReaders,

    #[error("no datapoints found for instance {0}")]
    NoDatapoints(String),

    #[error("metric source error for instance {node_id}: {reason}")]
    Source { node_id: String, reason: String },
}

/// Notification delivery failure. Logged only.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("notification endpoint rejected message with status {0}")]
    Rejected(u16),

    #[error("notification timed out")]
    Timeout,
}

/// An inbound trigger could not be decoded.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("failed to parse trigger payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to parse scaling message in record {message_id}: {reason}")]
    Message { message_id: String, reason: String },
}
