//! `Directory` and `MetricSource` implementations over the state store.
//!
//! Storage errors are translated into the engine's taxonomy here so the
//! reconciler never sees redb details.

use readscale_core::{
    BoxFuture, ClusterMember, CreateNodeRequest, Datapoint, Directory, DirectoryError,
    MetricError, MetricQuery, MetricSource, Node, Tag,
};

use crate::error::StateError;
use crate::store::StateStore;

impl Directory for StateStore {
    fn list_nodes<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Node>, DirectoryError>> {
        Box::pin(async move {
            self.list_nodes_for_cluster(cluster_id)
                .map_err(|e| DirectoryError::Inventory(e.to_string()))
        })
    }

    fn cluster_members<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ClusterMember>, DirectoryError>> {
        Box::pin(async move {
            match self.get_cluster(cluster_id) {
                Ok(Some(record)) => Ok(record.members),
                Ok(None) => Err(DirectoryError::ClusterNotFound(cluster_id.to_string())),
                Err(e) => Err(DirectoryError::Membership(e.to_string())),
            }
        })
    }

    fn create_node<'a>(
        &'a self,
        request: &'a CreateNodeRequest,
    ) -> BoxFuture<'a, Result<Node, DirectoryError>> {
        Box::pin(async move {
            self.provision_node(request)
                .map_err(|e| DirectoryError::Create {
                    node_id: request.node_id.clone(),
                    reason: e.to_string(),
                })
        })
    }

    fn delete_node<'a>(&'a self, node_id: &'a str) -> BoxFuture<'a, Result<(), DirectoryError>> {
        Box::pin(async move {
            let delete_err = |e: StateError| DirectoryError::Delete {
                node_id: node_id.to_string(),
                reason: e.to_string(),
            };
            match self.remove_node(node_id) {
                Ok(true) => Ok(()),
                Ok(false) => Err(delete_err(StateError::NotFound(node_id.to_string()))),
                Err(e) => Err(delete_err(e)),
            }
        })
    }

    fn list_tags<'a>(&'a self, arn: &'a str) -> BoxFuture<'a, Result<Vec<Tag>, DirectoryError>> {
        Box::pin(async move {
            self.get_tags(arn).map_err(|e| DirectoryError::ListTags {
                resource: arn.to_string(),
                reason: e.to_string(),
            })
        })
    }

    fn add_tags<'a>(
        &'a self,
        arn: &'a str,
        tags: &'a [Tag],
    ) -> BoxFuture<'a, Result<(), DirectoryError>> {
        Box::pin(async move {
            self.merge_tags(arn, tags)
                .map_err(|e| DirectoryError::AddTags {
                    resource: arn.to_string(),
                    reason: e.to_string(),
                })
        })
    }
}

impl MetricSource for StateStore {
    fn statistics<'a>(
        &'a self,
        query: &'a MetricQuery,
    ) -> BoxFuture<'a, Result<Vec<Datapoint>, MetricError>> {
        Box::pin(async move {
            self.aggregate_samples(query)
                .map_err(|e| MetricError::Source {
                    node_id: query.node_id.clone(),
                    reason: e.to_string(),
                })
        })
    }
}
