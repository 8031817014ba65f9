//! readscale-autoscale — the read-replica reconciliation engine.
//!
//! One invocation resolves the cluster topology, decides how many readers
//! to add or remove, mutates the directory and reports the result. The
//! whole attempt is wrapped by the retrying executor.
//!
//! # Decision Flow
//!
//! ```text
//! Metric mode
//!   readers   = topology(cluster).readers
//!   metric    = mean(latest datapoint of each reader)
//!   desired   = clamp(round(metric / target * readers), min, max)
//!   desired > readers  → create (desired - readers) readers, tag metric-owned
//!   desired < readers  → delete first available metric-owned reader
//!
//! Scheduled mode
//!   owned = readers tagged schedule-owned
//!   owned non-empty    → delete every available owned reader
//!   otherwise          → create delta readers (bounded by min/max)
//! ```

pub mod capacity;
pub mod error;
pub mod identifier;
pub mod ownership;
pub mod provisioner;
pub mod reconciler;
pub mod retry;
pub mod topology;

pub use capacity::{desired_capacity, scheduled_additions};
pub use error::{ReconcileError, TopologyError};
pub use provisioner::Provisioner;
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use retry::{RetryError, execute_with_retry};
pub use topology::Topology;
