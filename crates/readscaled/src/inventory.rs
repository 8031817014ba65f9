//! Directory maintenance commands: `nodes`, `seed`, `record-metric`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tracing::info;

use readscale_core::{NodeRole, NodeStatus, Ownership};
use readscale_state::StateStore;

/// One line of `readscaled nodes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub id: String,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub instance_class: String,
    pub ownership: Ownership,
}

pub fn print_nodes(state: &Path, cluster_id: &str) -> anyhow::Result<()> {
    let store = open(state)?;
    let rows = node_rows(&store, cluster_id)?;

    println!(
        "{:<48} {:<7} {:<10} {:<16} OWNER",
        "NODE", "ROLE", "STATUS", "CLASS"
    );
    for row in rows {
        let role = match row.role {
            NodeRole::Writer => "writer",
            NodeRole::Reader => "reader",
        };
        let owner = match row.ownership {
            Ownership::None => "-",
            Ownership::MetricMode => "metric",
            Ownership::ScheduleMode => "schedule",
        };
        println!(
            "{:<48} {:<7} {:<10} {:<16} {}",
            row.id,
            role,
            row.status.to_string(),
            row.instance_class,
            owner
        );
    }
    Ok(())
}

/// Nodes of `cluster_id` in directory order, with role and ownership.
pub fn node_rows(store: &StateStore, cluster_id: &str) -> anyhow::Result<Vec<NodeRow>> {
    let cluster = store
        .get_cluster(cluster_id)?
        .with_context(|| format!("cluster {cluster_id} not found"))?;
    let writer = cluster.writer().map(|m| m.node_id.clone());

    store
        .list_nodes_for_cluster(cluster_id)?
        .into_iter()
        .map(|node| -> anyhow::Result<NodeRow> {
            let tags = store.get_tags(&node.arn)?;
            let role = if writer.as_deref() == Some(node.id.as_str()) {
                NodeRole::Writer
            } else {
                NodeRole::Reader
            };
            Ok(NodeRow {
                ownership: Ownership::from_tags(&tags),
                role,
                status: node.status,
                instance_class: node.instance_class,
                id: node.id,
            })
        })
        .collect()
}

pub fn seed(state: &Path, cluster_id: &str, writer: &str, instance_class: &str) -> anyhow::Result<()> {
    let store = open(state)?;
    let node = store.seed_cluster(cluster_id, writer, instance_class)?;
    info!(cluster = %cluster_id, writer = %node.id, instance_class, "cluster seeded");
    Ok(())
}

pub fn record_metric(
    state: &Path,
    node_id: &str,
    metric: &str,
    value: f64,
    timestamp: Option<u64>,
) -> anyhow::Result<()> {
    let store = open(state)?;
    if store.get_node(node_id)?.is_none() {
        anyhow::bail!("node {node_id} not found");
    }
    let timestamp = timestamp.unwrap_or_else(epoch_secs);
    store.put_sample(node_id, metric, timestamp, value)?;
    info!(node = %node_id, metric, value, timestamp, "metric sample recorded");
    Ok(())
}

fn open(state: &Path) -> anyhow::Result<StateStore> {
    StateStore::open(state).with_context(|| format!("failed to open state file {}", state.display()))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use readscale_core::{CreateNodeRequest, ModeKind, Tag};

    #[test]
    fn rows_show_role_and_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readscale.redb");
        seed(&path, "orders", "orders-primary", "db.r6g.large").unwrap();

        let store = StateStore::open(&path).unwrap();
        let reader = store
            .provision_node(&CreateNodeRequest {
                cluster_id: "orders".into(),
                node_id: "orders-reader-000000001".into(),
                instance_class: "db.r6g.large".into(),
                promotion_tier: 15,
            })
            .unwrap();
        store
            .merge_tags(&reader.arn, &[Tag::ownership(ModeKind::Metric)])
            .unwrap();

        let rows = node_rows(&store, "orders").unwrap();
        assert_eq!(rows.len(), 2);
        let writer = rows.iter().find(|r| r.id == "orders-primary").unwrap();
        assert_eq!(writer.role, NodeRole::Writer);
        assert_eq!(writer.ownership, Ownership::None);
        let reader = rows.iter().find(|r| r.id == "orders-reader-000000001").unwrap();
        assert_eq!(reader.role, NodeRole::Reader);
        assert_eq!(reader.ownership, Ownership::MetricMode);
    }

    #[test]
    fn unknown_cluster_is_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(node_rows(&store, "nope").is_err());
    }

    #[test]
    fn metrics_only_for_known_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readscale.redb");
        seed(&path, "orders", "orders-primary", "db.r6g.large").unwrap();

        record_metric(&path, "orders-primary", "CPUUtilization", 42.0, Some(1_000)).unwrap();
        assert!(record_metric(&path, "ghost", "CPUUtilization", 1.0, None).is_err());
    }
}
