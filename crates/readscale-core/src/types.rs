//! Domain types shared by the reconciliation engine and its collaborators.
//!
//! Nodes, tags and cluster membership mirror what the control-plane
//! directory reports. None of them are cached across invocations: every
//! reconciliation reads them fresh.

use serde::{Deserialize, Serialize};

/// Identifier of a cluster in the directory.
pub type ClusterId = String;

/// Identifier of a single node (instance) in the directory.
pub type NodeId = String;

/// Tag key marking a reader created by metric-mode reconciliation.
pub const METRIC_TAG_KEY: &str = "readscale-created";

/// Tag key marking a reader created by schedule-mode reconciliation.
pub const SCHEDULE_TAG_KEY: &str = "readscale-scheduler";

/// The only tag value recognised as "owned".
pub const OWNED_TAG_VALUE: &str = "true";

// ── Node ──────────────────────────────────────────────────────────

/// A database node as reported by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Resource name used for tag lookups.
    pub arn: String,
    pub cluster_id: ClusterId,
    pub instance_class: String,
    pub status: NodeStatus,
    /// Unix timestamp (seconds) when the node was registered.
    pub created_at: u64,
}

impl Node {
    /// Whether the node may be removed right now.
    pub fn is_available(&self) -> bool {
        self.status == NodeStatus::Available
    }
}

/// Lifecycle status of a node. Only `Available` is actionable for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    Available,
    Creating,
    Modifying,
    Rebooting,
    Deleting,
    Failed,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Available => "available",
            NodeStatus::Creating => "creating",
            NodeStatus::Modifying => "modifying",
            NodeStatus::Rebooting => "rebooting",
            NodeStatus::Deleting => "deleting",
            NodeStatus::Failed => "failed",
            NodeStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Role of a node within its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Writer,
    Reader,
}

/// One entry of the cluster membership list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterMember {
    pub node_id: NodeId,
    /// True for the write-owner of the cluster.
    pub is_writer: bool,
}

/// Request to create a reader node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateNodeRequest {
    pub cluster_id: ClusterId,
    pub node_id: NodeId,
    pub instance_class: String,
    /// Failover priority; engine-created readers use the lowest (15).
    pub promotion_tier: u8,
}

// ── Tags & ownership ──────────────────────────────────────────────

/// A key/value resource tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The ownership marker written on every node created in `mode`.
    pub fn ownership(mode: ModeKind) -> Self {
        Self::new(mode.tag_key(), OWNED_TAG_VALUE)
    }
}

/// Which scaling path is running. Used for tag keys and identifier suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Metric,
    Scheduled,
}

impl ModeKind {
    /// Tag key that marks nodes created by this mode.
    pub fn tag_key(self) -> &'static str {
        match self {
            ModeKind::Metric => METRIC_TAG_KEY,
            ModeKind::Scheduled => SCHEDULE_TAG_KEY,
        }
    }

    /// Middle segment of generated node identifiers.
    pub fn id_suffix(self) -> &'static str {
        match self {
            ModeKind::Metric => "reader",
            ModeKind::Scheduled => "scheduler",
        }
    }
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeKind::Metric => f.write_str("metric"),
            ModeKind::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Which mode (if any) created a node, derived from its tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    None,
    MetricMode,
    ScheduleMode,
}

impl Ownership {
    /// Derive ownership from a tag set. A node carrying both markers is
    /// reported as metric-owned; decisions use [`is_owned_by`] instead.
    pub fn from_tags(tags: &[Tag]) -> Self {
        if is_owned_by(tags, ModeKind::Metric) {
            Ownership::MetricMode
        } else if is_owned_by(tags, ModeKind::Scheduled) {
            Ownership::ScheduleMode
        } else {
            Ownership::None
        }
    }
}

/// True iff `tags` holds `mode`'s tag key with the literal value `"true"`.
pub fn is_owned_by(tags: &[Tag], mode: ModeKind) -> bool {
    let key = mode.tag_key();
    tags.iter()
        .any(|t| t.key == key && t.value == OWNED_TAG_VALUE)
}

// ── Metrics ───────────────────────────────────────────────────────

/// A single aggregated statistic returned by the metric source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Datapoint {
    /// Unix timestamp (seconds) of the aggregation period start.
    pub timestamp: u64,
    /// Average of the samples in the period.
    pub average: f64,
}

/// Query for one node's statistic over a trailing window.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub node_id: NodeId,
    pub metric_name: String,
    /// Window start (unix seconds, inclusive).
    pub start: u64,
    /// Window end (unix seconds, exclusive).
    pub end: u64,
    /// Aggregation period in seconds.
    pub period: u64,
}

// ── Decisions & events ────────────────────────────────────────────

/// Outcome of the decision phase of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "replicas", rename_all = "snake_case")]
pub enum ScalingDecision {
    ScaleOut(u32),
    ScaleIn(u32),
    NoOp,
}

/// Human-facing notification about a scaling action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleEvent {
    ScaledOut {
        cluster_id: ClusterId,
        added: u32,
    },
    ScaledIn {
        cluster_id: ClusterId,
        removed: u32,
    },
    Failed {
        cluster_id: ClusterId,
        action: String,
        error: String,
    },
}

impl ScaleEvent {
    /// Render the event as a one-line message.
    pub fn message(&self) -> String {
        match self {
            ScaleEvent::ScaledOut { cluster_id, added } => {
                format!("Scaled out cluster {cluster_id} by adding {added} replicas.")
            }
            ScaleEvent::ScaledIn {
                cluster_id,
                removed,
            } => {
                format!("Scaled in cluster {cluster_id} by removing {removed} replicas.")
            }
            ScaleEvent::Failed {
                cluster_id,
                action,
                error,
            } => format!("Failed to {action} on cluster {cluster_id}: {error}"),
        }
    }

    pub fn cluster_id(&self) -> &str {
        match self {
            ScaleEvent::ScaledOut { cluster_id, .. }
            | ScaleEvent::ScaledIn { cluster_id, .. }
            | ScaleEvent::Failed { cluster_id, .. } => cluster_id,
        }
    }
}
