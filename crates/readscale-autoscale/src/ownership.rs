//! Ownership tagger — reads and writes the per-mode ownership markers.
//!
//! Ownership is derived from the directory's tags on every call and never
//! cached on the node.

use tracing::{debug, warn};

use readscale_core::{Directory, DirectoryError, ModeKind, Node, Ownership, Tag, is_owned_by};

/// Which mode (if any) created `node`.
pub async fn ownership_of<D: Directory + ?Sized>(
    directory: &D,
    node: &Node,
) -> Result<Ownership, DirectoryError> {
    let tags = directory.list_tags(&node.arn).await?;
    Ok(Ownership::from_tags(&tags))
}

/// Whether `node` carries `mode`'s ownership marker.
pub async fn is_owned<D: Directory + ?Sized>(
    directory: &D,
    node: &Node,
    mode: ModeKind,
) -> Result<bool, DirectoryError> {
    let tags = directory.list_tags(&node.arn).await?;
    let owned = is_owned_by(&tags, mode);
    debug!(node = %node.id, %mode, owned, "ownership checked");
    Ok(owned)
}

/// Mark a freshly created node as owned by `mode`.
///
/// Best-effort: a failed tag write is logged and the node stays untracked.
/// Returns whether the tag was written.
pub async fn mark_owned<D: Directory + ?Sized>(directory: &D, node: &Node, mode: ModeKind) -> bool {
    let tags = [Tag::ownership(mode)];
    match directory.add_tags(&node.arn, &tags).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                node = %node.id,
                %mode,
                error = %e,
                "failed to tag new reader; it will not be managed"
            );
            false
        }
    }
}
