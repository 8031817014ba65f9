//! readscale-state — embedded cluster directory for readscale.
//!
//! Backed by [redb](https://docs.rs/redb), stores cluster membership,
//! nodes, resource tags and raw metric samples. [`StateStore`] implements
//! the engine's `Directory` and `MetricSource` traits, so the autoscaler
//! can run end to end against a local file or an in-memory database.
//!
//! # Architecture
//!
//! ```text
//! StateStore
//!   ├── clusters  cluster_id → ClusterRecord (membership, writer flag)
//!   ├── nodes     node_id → Node
//!   ├── tags      arn → [Tag]
//!   └── samples   node|metric|ts → f64
//! ```
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod directory;
pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::{ClusterRecord, StateStore, node_arn};
