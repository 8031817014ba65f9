//! Interfaces of the external collaborators the engine drives.
//!
//! The directory, metric source and notifier are injected so the
//! engine can run against the embedded store, a real control plane, or
//! test doubles. Methods return boxed futures to keep the traits
//! object-safe.

use std::future::Future;
use std::pin::Pin;

use crate::error::{DirectoryError, MetricError, NotifyError};
use crate::types::*;

/// Boxed, sendable future returned by collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Control-plane view of cluster nodes, membership and tags.
pub trait Directory: Send + Sync {
    /// All nodes of the cluster, in directory order.
    fn list_nodes<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Node>, DirectoryError>>;

    /// Membership list, flagging the write-owner.
    fn cluster_members<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ClusterMember>, DirectoryError>>;

    /// Create a reader node and return it as registered.
    fn create_node<'a>(
        &'a self,
        request: &'a CreateNodeRequest,
    ) -> BoxFuture<'a, Result<Node, DirectoryError>>;

    /// Delete a node by identifier.
    fn delete_node<'a>(&'a self, node_id: &'a str) -> BoxFuture<'a, Result<(), DirectoryError>>;

    /// Tags attached to a resource.
    fn list_tags<'a>(&'a self, arn: &'a str) -> BoxFuture<'a, Result<Vec<Tag>, DirectoryError>>;

    /// Attach (or overwrite) tags on a resource.
    fn add_tags<'a>(
        &'a self,
        arn: &'a str,
        tags: &'a [Tag],
    ) -> BoxFuture<'a, Result<(), DirectoryError>>;
}

/// Time-series store queried for per-node statistics.
pub trait MetricSource: Send + Sync {
    /// Average statistic for `query`, one datapoint per period.
    fn statistics<'a>(
        &'a self,
        query: &'a MetricQuery,
    ) -> BoxFuture<'a, Result<Vec<Datapoint>, MetricError>>;
}

/// Fire-and-forget delivery of scale events.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, event: &'a ScaleEvent) -> BoxFuture<'a, Result<(), NotifyError>>;
}
