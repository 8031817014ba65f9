//! redb table definitions for the readscale state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types), except raw metric samples which store `f64` directly.

use redb::TableDefinition;

/// Cluster records (membership) keyed by `{cluster_id}`.
pub const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");

/// Nodes keyed by `{node_id}`. Node identifiers are unique directory-wide.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Tag sets keyed by resource `{arn}`.
pub const TAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");

/// Metric samples keyed by `{node_id}|{metric}|{timestamp:020}`.
pub const SAMPLES: TableDefinition<&str, f64> = TableDefinition::new("samples");
