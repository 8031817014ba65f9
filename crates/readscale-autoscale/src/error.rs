//! Reconciliation errors. Everything here is retried by the executor.

use thiserror::Error;

use readscale_core::{DirectoryError, MetricError};

/// The writer could not be identified from cluster membership.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("no writer instance found in cluster {0}")]
    NoWriter(String),

    #[error("cluster {cluster} reports {count} writers")]
    AmbiguousWriter { cluster: String, count: usize },

    #[error("writer {writer} of cluster {cluster} is missing from the node inventory")]
    WriterMissing { cluster: String, writer: String },
}

/// Failure of a single reconciliation attempt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}
