//! readscale-metrics — utilization sampling for metric-mode scaling.
//!
//! Queries the metric source once per reader over a trailing window and
//! averages the latest datapoint of each reader.
//!
//! # Architecture
//!
//! ```text
//! MetricSampler
//!   ├── MetricSource::statistics() ← one query per reader, sequential
//!   ├── latest datapoint per reader
//!   └── unweighted mean across readers
//! ```

pub mod sampler;

pub use sampler::{MetricSample, MetricSampler, SAMPLE_WINDOW};
