//! StateStore — redb-backed cluster directory for readscale.
//!
//! Provides typed CRUD operations over clusters, nodes, tags and metric
//! samples. Values are JSON-serialized into redb's `&[u8]` value columns.
//! The store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

use readscale_core::{ClusterMember, CreateNodeRequest, Datapoint, MetricQuery, Node, NodeStatus, Tag};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Membership record of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterRecord {
    pub id: String,
    pub members: Vec<ClusterMember>,
}

impl ClusterRecord {
    pub fn writer(&self) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.is_writer)
    }
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    /// Status assigned to freshly provisioned nodes.
    provision_status: NodeStatus,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            provision_status: NodeStatus::Available,
        };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            provision_status: NodeStatus::Available,
        };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Register new nodes with `status` instead of `available`.
    pub fn with_provision_status(mut self, status: NodeStatus) -> Self {
        self.provision_status = status;
        self
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(TAGS).map_err(map_err!(Table))?;
        txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Clusters ───────────────────────────────────────────────────

    /// Insert or update a cluster record.
    pub fn put_cluster(&self, cluster: &ClusterRecord) -> StateResult<()> {
        let value = serde_json::to_vec(cluster).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            table
                .insert(cluster.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(cluster = %cluster.id, members = cluster.members.len(), "cluster stored");
        Ok(())
    }

    /// Get a cluster record by ID.
    pub fn get_cluster(&self, cluster_id: &str) -> StateResult<Option<ClusterRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        match table.get(cluster_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ClusterRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Register a cluster with its writer node in one step.
    pub fn seed_cluster(
        &self,
        cluster_id: &str,
        writer_id: &str,
        instance_class: &str,
    ) -> StateResult<Node> {
        let writer = Node {
            id: writer_id.to_string(),
            arn: node_arn(writer_id),
            cluster_id: cluster_id.to_string(),
            instance_class: instance_class.to_string(),
            status: NodeStatus::Available,
            created_at: epoch_secs(),
        };
        self.put_node(&writer)?;

        let mut record = self.get_cluster(cluster_id)?.unwrap_or(ClusterRecord {
            id: cluster_id.to_string(),
            members: Vec::new(),
        });
        for member in &mut record.members {
            member.is_writer = false;
        }
        record.members.retain(|m| m.node_id != writer_id);
        record.members.push(ClusterMember {
            node_id: writer_id.to_string(),
            is_writer: true,
        });
        self.put_cluster(&record)?;
        Ok(writer)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node.
    pub fn put_node(&self, node: &Node) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by ID.
    pub fn get_node(&self, node_id: &str) -> StateResult<Option<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: Node =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes belonging to a cluster, ordered by node ID.
    pub fn list_nodes_for_cluster(&self, cluster_id: &str) -> StateResult<Vec<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: Node =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if node.cluster_id == cluster_id {
                results.push(node);
            }
        }
        Ok(results)
    }

    /// Update the status of an existing node.
    pub fn set_node_status(&self, node_id: &str, status: NodeStatus) -> StateResult<()> {
        let mut node = self
            .get_node(node_id)?
            .ok_or_else(|| StateError::NotFound(node_id.to_string()))?;
        node.status = status;
        self.put_node(&node)
    }

    /// Provision a reader: store the node and add it to the membership list.
    pub fn provision_node(&self, request: &CreateNodeRequest) -> StateResult<Node> {
        let mut cluster = self
            .get_cluster(&request.cluster_id)?
            .ok_or_else(|| StateError::NotFound(format!("cluster {}", request.cluster_id)))?;
        if self.get_node(&request.node_id)?.is_some() {
            return Err(StateError::AlreadyExists(request.node_id.clone()));
        }

        let node = Node {
            id: request.node_id.clone(),
            arn: node_arn(&request.node_id),
            cluster_id: request.cluster_id.clone(),
            instance_class: request.instance_class.clone(),
            status: self.provision_status,
            created_at: epoch_secs(),
        };
        self.put_node(&node)?;

        cluster.members.push(ClusterMember {
            node_id: node.id.clone(),
            is_writer: false,
        });
        self.put_cluster(&cluster)?;
        debug!(node = %node.id, cluster = %node.cluster_id, "node provisioned");
        Ok(node)
    }

    /// Remove a reader together with its membership entry and tags.
    /// Returns true if it existed.
    pub fn remove_node(&self, node_id: &str) -> StateResult<bool> {
        let Some(node) = self.get_node(node_id)? else {
            return Ok(false);
        };
        if let Some(mut cluster) = self.get_cluster(&node.cluster_id)? {
            if cluster
                .members
                .iter()
                .any(|m| m.node_id == node_id && m.is_writer)
            {
                return Err(StateError::WriterProtected {
                    action: "delete",
                    node_id: node_id.to_string(),
                });
            }
            cluster.members.retain(|m| m.node_id != node_id);
            self.put_cluster(&cluster)?;
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            nodes.remove(node_id).map_err(map_err!(Write))?;
            let mut tags = txn.open_table(TAGS).map_err(map_err!(Table))?;
            tags.remove(node.arn.as_str()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node = %node_id, "node removed");
        Ok(true)
    }

    // ── Tags ───────────────────────────────────────────────────────

    /// Tags attached to a resource (empty if none).
    pub fn get_tags(&self, arn: &str) -> StateResult<Vec<Tag>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TAGS).map_err(map_err!(Table))?;
        match table.get(arn).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Merge `tags` into the resource's tag set, overwriting equal keys.
    /// The resource must be a known node.
    pub fn merge_tags(&self, arn: &str, tags: &[Tag]) -> StateResult<()> {
        let known = match arn.strip_prefix(ARN_PREFIX) {
            Some(node_id) => self.get_node(node_id)?.is_some(),
            None => false,
        };
        if !known {
            return Err(StateError::NotFound(format!("resource {arn}")));
        }

        let mut current = self.get_tags(arn)?;
        for tag in tags {
            match current.iter_mut().find(|t| t.key == tag.key) {
                Some(existing) => existing.value = tag.value.clone(),
                None => current.push(tag.clone()),
            }
        }
        let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TAGS).map_err(map_err!(Table))?;
            table
                .insert(arn, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Metric samples ─────────────────────────────────────────────

    /// Record a raw metric sample for a node.
    pub fn put_sample(
        &self,
        node_id: &str,
        metric: &str,
        timestamp: u64,
        value: f64,
    ) -> StateResult<()> {
        let key = sample_key(node_id, metric, timestamp);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Average the samples of `query` into one datapoint per period.
    /// Periods without samples produce no datapoint.
    pub fn aggregate_samples(&self, query: &MetricQuery) -> StateResult<Vec<Datapoint>> {
        let period = query.period.max(1);
        let lower = sample_key(&query.node_id, &query.metric_name, query.start);
        let upper = sample_key(&query.node_id, &query.metric_name, query.end);

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;

        // bucket start → (sum, count)
        let mut buckets: Vec<(u64, f64, u32)> = Vec::new();
        for entry in table
            .range(lower.as_str()..upper.as_str())
            .map_err(map_err!(Read))?
        {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let Some(timestamp) = key
                .value()
                .rsplit('|')
                .next()
                .and_then(|ts| ts.parse::<u64>().ok())
            else {
                continue;
            };
            let bucket = query.start + (timestamp - query.start) / period * period;
            match buckets.last_mut() {
                Some((start, sum, count)) if *start == bucket => {
                    *sum += value.value();
                    *count += 1;
                }
                _ => buckets.push((bucket, value.value(), 1)),
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(timestamp, sum, count)| Datapoint {
                timestamp,
                average: sum / count as f64,
            })
            .collect())
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("provision_status", &self.provision_status)
            .finish_non_exhaustive()
    }
}

const ARN_PREFIX: &str = "arn:readscale:node:";

/// Resource name for a node.
pub fn node_arn(node_id: &str) -> String {
    format!("{ARN_PREFIX}{node_id}")
}

fn sample_key(node_id: &str, metric: &str, timestamp: u64) -> String {
    format!("{node_id}|{metric}|{timestamp:020}")
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

    fn seeded() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        store.seed_cluster("orders", "orders-writer", "db.r6g.large").unwrap();
        store
    }

    fn request(node_id: &str) -> CreateNodeRequest {
        CreateNodeRequest {
            cluster_id: "orders".to_string(),
            node_id: node_id.to_string(),
            instance_class: "db.r6g.large".to_string(),
            promotion_tier: 15,
        }
    }

    // ── Clusters ───────────────────────────────────────────────────

    #[test]
    fn seed_registers_writer() {
        let store = seeded();
        let cluster = store.get_cluster("orders").unwrap().unwrap();
        assert_eq!(cluster.writer().unwrap().node_id, "orders-writer");

        let writer = store.get_node("orders-writer").unwrap().unwrap();
        assert_eq!(writer.status, NodeStatus::Available);
        assert_eq!(writer.arn, node_arn("orders-writer"));
    }

    #[test]
    fn reseeding_moves_the_writer_flag() {
        let store = seeded();
        store.seed_cluster("orders", "orders-writer-2", "db.r6g.large").unwrap();

        let cluster = store.get_cluster("orders").unwrap().unwrap();
        let writers: Vec<_> = cluster.members.iter().filter(|m| m.is_writer).collect();
        assert_eq!(writers.len(), 1);
        assert_eq!(writers[0].node_id, "orders-writer-2");
    }

    #[test]
    fn get_nonexistent_cluster_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_cluster("nope").unwrap().is_none());
    }

    // ── Nodes ──────────────────────────────────────────────────────

    #[test]
    fn provision_adds_member_and_node() {
        let store = seeded();
        let node = store.provision_node(&request("orders-reader-1")).unwrap();
        assert_eq!(node.status, NodeStatus::Available);

        let cluster = store.get_cluster("orders").unwrap().unwrap();
        assert_eq!(cluster.members.len(), 2);
        assert_eq!(store.list_nodes_for_cluster("orders").unwrap().len(), 2);
    }

    #[test]
    fn provision_rejects_duplicates_and_unknown_clusters() {
        let store = seeded();
        store.provision_node(&request("orders-reader-1")).unwrap();
        assert!(matches!(
            store.provision_node(&request("orders-reader-1")),
            Err(StateError::AlreadyExists(_))
        ));

        let mut orphan = request("lonely");
        orphan.cluster_id = "missing".to_string();
        assert!(matches!(
            store.provision_node(&orphan),
            Err(StateError::NotFound(_))
        ));
    }

    #[test]
    fn provision_status_is_configurable() {
        let store = StateStore::open_in_memory()
            .unwrap()
            .with_provision_status(NodeStatus::Creating);
        store.seed_cluster("orders", "orders-writer", "db.r6g.large").unwrap();
        let node = store.provision_node(&request("orders-reader-1")).unwrap();
        assert_eq!(node.status, NodeStatus::Creating);
    }

    #[test]
    fn remove_drops_member_and_tags() {
        let store = seeded();
        let node = store.provision_node(&request("orders-reader-1")).unwrap();
        store.merge_tags(&node.arn, &[Tag::new("k", "v")]).unwrap();

        assert!(store.remove_node("orders-reader-1").unwrap());
        assert!(!store.remove_node("orders-reader-1").unwrap());
        assert!(store.get_tags(&node.arn).unwrap().is_empty());
        assert_eq!(
            store.get_cluster("orders").unwrap().unwrap().members.len(),
            1
        );
    }

    #[test]
    fn writer_cannot_be_removed() {
        let store = seeded();
        assert!(matches!(
            store.remove_node("orders-writer"),
            Err(StateError::WriterProtected { .. })
        ));
        assert!(store.get_node("orders-writer").unwrap().is_some());
    }

    #[test]
    fn nodes_are_scoped_to_their_cluster() {
        let store = seeded();
        store.seed_cluster("billing", "billing-writer", "db.r6g.large").unwrap();
        assert_eq!(store.list_nodes_for_cluster("orders").unwrap().len(), 1);
        assert_eq!(store.list_nodes_for_cluster("billing").unwrap().len(), 1);
    }

    #[test]
    fn set_status_updates_node() {
        let store = seeded();
        store.provision_node(&request("orders-reader-1")).unwrap();
        store
            .set_node_status("orders-reader-1", NodeStatus::Modifying)
            .unwrap();
        assert_eq!(
            store.get_node("orders-reader-1").unwrap().unwrap().status,
            NodeStatus::Modifying
        );
        assert!(matches!(
            store.set_node_status("ghost", NodeStatus::Available),
            Err(StateError::NotFound(_))
        ));
    }

    // ── Tags ───────────────────────────────────────────────────────

    #[test]
    fn merge_tags_overwrites_by_key() {
        let store = seeded();
        let arn = node_arn("orders-writer");
        store
            .merge_tags(&arn, &[Tag::new("a", "1"), Tag::new("b", "2")])
            .unwrap();
        store.merge_tags(&arn, &[Tag::new("a", "3")]).unwrap();

        let tags = store.get_tags(&arn).unwrap();
        assert_eq!(tags, vec![Tag::new("a", "3"), Tag::new("b", "2")]);
    }

    #[test]
    fn merge_tags_rejects_unknown_resource() {
        let store = seeded();
        assert!(matches!(
            store.merge_tags(&node_arn("ghost"), &[Tag::new("a", "1")]),
            Err(StateError::NotFound(_))
        ));
        assert!(matches!(
            store.merge_tags("arn:x", &[Tag::new("a", "1")]),
            Err(StateError::NotFound(_))
        ));
    }

    // ── Samples ────────────────────────────────────────────────────

    #[test]
    fn aggregate_averages_within_window() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_sample("r1", "CPUUtilization", 950, 99.0).unwrap();
        store.put_sample("r1", "CPUUtilization", 1000, 40.0).unwrap();
        store.put_sample("r1", "CPUUtilization", 1100, 60.0).unwrap();
        store.put_sample("r1", "CPUUtilization", 1300, 99.0).unwrap();
        store.put_sample("r1", "FreeableMemory", 1100, 1.0).unwrap();
        store.put_sample("r2", "CPUUtilization", 1100, 1.0).unwrap();

        let points = store
            .aggregate_samples(&MetricQuery {
                node_id: "r1".into(),
                metric_name: "CPUUtilization".into(),
                start: 1000,
                end: 1300,
                period: 300,
            })
            .unwrap();
        assert_eq!(
            points,
            vec![Datapoint {
                timestamp: 1000,
                average: 50.0
            }]
        );
    }

    #[test]
    fn aggregate_splits_into_periods() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_sample("r1", "cpu", 0, 10.0).unwrap();
        store.put_sample("r1", "cpu", 30, 20.0).unwrap();
        store.put_sample("r1", "cpu", 70, 30.0).unwrap();

        let points = store
            .aggregate_samples(&MetricQuery {
                node_id: "r1".into(),
                metric_name: "cpu".into(),
                start: 0,
                end: 120,
                period: 60,
            })
            .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].average, 15.0);
        assert_eq!(points[1].timestamp, 60);
    }

    #[test]
    fn aggregate_without_samples_is_empty() {
        let store = StateStore::open_in_memory().unwrap();
        let points = store
            .aggregate_samples(&MetricQuery {
                node_id: "r1".into(),
                metric_name: "cpu".into(),
                start: 0,
                end: 300,
                period: 300,
            })
            .unwrap();
        assert!(points.is_empty());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.seed_cluster("orders", "orders-writer", "db.r6g.large").unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let cluster = store.get_cluster("orders").unwrap();
        assert!(cluster.is_some());
        assert_eq!(store.list_nodes_for_cluster("orders").unwrap().len(), 1);
    }
}
