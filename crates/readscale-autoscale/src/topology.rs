//! Topology resolver — splits a cluster into its writer and readers.

use tracing::debug;

use readscale_core::{Directory, Node};

use crate::error::{ReconcileError, TopologyError};

/// Writer and readers of a cluster, in directory order.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub writer: Node,
    pub readers: Vec<Node>,
}

impl Topology {
    /// Current capacity: the number of readers.
    pub fn reader_count(&self) -> u32 {
        u32::try_from(self.readers.len()).unwrap_or(u32::MAX)
    }

    /// Instance class for new readers: the override, else the writer's.
    pub fn instance_class_for<'a>(&'a self, override_class: Option<&'a str>) -> &'a str {
        override_class.unwrap_or(&self.writer.instance_class)
    }
}

/// Read the node inventory and membership of `cluster_id`.
///
/// The writer is the unique member flagged as write-owner. Every other
/// node of the inventory is a reader.
pub async fn resolve<D: Directory + ?Sized>(
    directory: &D,
    cluster_id: &str,
) -> Result<Topology, ReconcileError> {
    let nodes = directory.list_nodes(cluster_id).await?;
    let members = directory.cluster_members(cluster_id).await?;

    let writers: Vec<_> = members.iter().filter(|m| m.is_writer).collect();
    let writer_id = match writers.as_slice() {
        [writer] => writer.node_id.clone(),
        [] => return Err(TopologyError::NoWriter(cluster_id.to_string()).into()),
        many => {
            return Err(TopologyError::AmbiguousWriter {
                cluster: cluster_id.to_string(),
                count: many.len(),
            }
            .into());
        }
    };

    let mut writer = None;
    let mut readers = Vec::with_capacity(nodes.len().saturating_sub(1));
    for node in nodes {
        if node.id == writer_id {
            writer = Some(node);
        } else {
            readers.push(node);
        }
    }

    let writer = writer.ok_or_else(|| TopologyError::WriterMissing {
        cluster: cluster_id.to_string(),
        writer: writer_id.clone(),
    })?;

    debug!(
        cluster = %cluster_id,
        writer = %writer.id,
        readers = readers.len(),
        "topology resolved"
    );
    Ok(Topology { writer, readers })
}
