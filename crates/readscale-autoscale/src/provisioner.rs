//! Instance provisioner — creates and deletes reader nodes.
//!
//! Under dry-run no mutating directory call is made: every create or
//! delete is logged as "would create"/"would remove" instead, and no tags
//! are written. Read-only calls (tag lookups) still happen.

use tracing::{debug, error, info, warn};

use readscale_core::{
    ClusterConfig, CreateNodeRequest, Directory, DirectoryError, ModeKind, Node, NodeId,
};

use crate::identifier;
use crate::ownership;

/// Failover priority given to every engine-created reader (lowest).
pub const READER_PROMOTION_TIER: u8 = 15;

pub struct Provisioner<'a, D: Directory + ?Sized> {
    directory: &'a D,
    cluster_id: &'a str,
    dry_run: bool,
}

impl<'a, D: Directory + ?Sized> Provisioner<'a, D> {
    pub fn new(directory: &'a D, config: &'a ClusterConfig) -> Self {
        Self {
            directory,
            cluster_id: &config.cluster_id,
            dry_run: config.dry_run,
        }
    }

    /// Create `count` readers of `instance_class`, each tagged as owned by
    /// `mode`. Returns the identifiers created (or that would be created).
    ///
    /// Stops at the first failed create; readers created before it stay.
    pub async fn create_readers(
        &self,
        mode: ModeKind,
        count: u32,
        instance_class: &str,
    ) -> Result<Vec<NodeId>, DirectoryError> {
        let mut created = Vec::with_capacity(count as usize);

        for i in 0..count {
            let node_id = identifier::generate(self.cluster_id, mode);

            if self.dry_run {
                info!(
                    cluster = %self.cluster_id,
                    node = %node_id,
                    %mode,
                    instance_class,
                    "dry run: would create reader"
                );
                created.push(node_id);
                continue;
            }

            let request = CreateNodeRequest {
                cluster_id: self.cluster_id.to_string(),
                node_id,
                instance_class: instance_class.to_string(),
                promotion_tier: READER_PROMOTION_TIER,
            };
            let node = self.directory.create_node(&request).await.inspect_err(|e| {
                error!(
                    cluster = %self.cluster_id,
                    node = %request.node_id,
                    remaining = count - i,
                    error = %e,
                    "failed to create reader"
                );
            })?;

            ownership::mark_owned(self.directory, &node, mode).await;
            info!(cluster = %self.cluster_id, node = %node.id, %mode, "reader created");
            created.push(node.id);
        }

        Ok(created)
    }

    /// Remove the first reader, in directory order, that is available and
    /// metric-owned. Returns its identifier, or `None` if nothing qualified.
    ///
    /// A reader whose tags cannot be read is skipped rather than failing
    /// the scan.
    pub async fn remove_first_owned(
        &self,
        readers: &[Node],
    ) -> Result<Option<NodeId>, DirectoryError> {
        for reader in readers {
            if !reader.is_available() {
                debug!(node = %reader.id, status = %reader.status, "reader not available, skipping");
                continue;
            }

            match ownership::is_owned(self.directory, reader, ModeKind::Metric).await {
                Ok(true) => {
                    self.remove(reader).await?;
                    return Ok(Some(reader.id.clone()));
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(node = %reader.id, error = %e, "failed to check ownership tag, skipping");
                }
            }
        }

        info!(cluster = %self.cluster_id, "no metric-owned readers available for removal");
        Ok(None)
    }

    /// Remove every available node of `owned`. Nodes in any other status
    /// are left for a later invocation. Returns the identifiers removed.
    pub async fn remove_owned(&self, owned: &[Node]) -> Result<Vec<NodeId>, DirectoryError> {
        let mut removed = Vec::with_capacity(owned.len());
        for node in owned {
            if !node.is_available() {
                info!(node = %node.id, status = %node.status, "reader not available, skipping");
                continue;
            }
            self.remove(node).await?;
            removed.push(node.id.clone());
        }
        Ok(removed)
    }

    async fn remove(&self, node: &Node) -> Result<(), DirectoryError> {
        if self.dry_run {
            info!(cluster = %self.cluster_id, node = %node.id, "dry run: would remove reader");
            return Ok(());
        }

        self.directory.delete_node(&node.id).await.inspect_err(|e| {
            error!(cluster = %self.cluster_id, node = %node.id, error = %e, "failed to delete reader");
        })?;
        info!(cluster = %self.cluster_id, node = %node.id, "reader removed");
        Ok(())
    }
}
