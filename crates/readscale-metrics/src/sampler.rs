//! Metric sampler — averages a utilization statistic across readers.
//!
//! Each reader is queried for the trailing [`SAMPLE_WINDOW`] with a single
//! aggregation period spanning the whole window. A reader without
//! datapoints fails the whole sample; there is no partial average.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use readscale_core::{MetricError, MetricQuery, MetricSource, Node, NodeId};

/// Trailing window (and aggregation period) of every query.
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Result of sampling all readers.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Unweighted mean across readers.
    pub average: f64,
    /// Latest value per reader, in reader order.
    pub per_node: Vec<(NodeId, f64)>,
}

/// Samples one named metric from a [`MetricSource`].
pub struct MetricSampler<'a, M: MetricSource + ?Sized> {
    source: &'a M,
    metric_name: &'a str,
    window: Duration,
}

impl<'a, M: MetricSource + ?Sized> MetricSampler<'a, M> {
    pub fn new(source: &'a M, metric_name: &'a str) -> Self {
        Self {
            source,
            metric_name,
            window: SAMPLE_WINDOW,
        }
    }

    /// Sample `readers` over the window ending now.
    pub async fn sample(&self, readers: &[Node]) -> Result<MetricSample, MetricError> {
        self.sample_at(readers, epoch_secs()).await
    }

    /// Sample `readers` over the window ending at `now` (unix seconds).
    pub async fn sample_at(&self, readers: &[Node], now: u64) -> Result<MetricSample, MetricError> {
        if readers.is_empty() {
            return Err(MetricError::NoReaders);
        }

        let window = self.window.as_secs();
        let mut per_node = Vec::with_capacity(readers.len());

        for reader in readers {
            let query = MetricQuery {
                node_id: reader.id.clone(),
                metric_name: self.metric_name.to_string(),
                start: now.saturating_sub(window),
                end: now,
                period: window,
            };

            let datapoints = self.source.statistics(&query).await.inspect_err(|e| {
                warn!(node = %reader.id, error = %e, "failed to get metric statistics");
            })?;

            let latest = datapoints
                .iter()
                .max_by_key(|d| d.timestamp)
                .ok_or_else(|| {
                    warn!(node = %reader.id, metric = self.metric_name, "no datapoints found");
                    MetricError::NoDatapoints(reader.id.clone())
                })?;

            debug!(
                node = %reader.id,
                metric = self.metric_name,
                value = latest.average,
                "reader metric sampled"
            );
            per_node.push((reader.id.clone(), latest.average));
        }

        let total: f64 = per_node.iter().map(|(_, v)| v).sum();
        Ok(MetricSample {
            average: total / per_node.len() as f64,
            per_node,
        })
    }
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
    use readscale_core::{BoxFuture, Datapoint, NodeStatus};
    use readscale_state::StateStore;

    const NOW: u64 = 10_000;

    fn reader(id: &str) -> Node {
        Node {
            id: id.to_string(),
            arn: format!("arn:test:{id}"),
            cluster_id: "orders".to_string(),
            instance_class: "db.r6g.large".to_string(),
            status: NodeStatus::Available,
            created_at: 0,
        }
    }

    /// Returns canned datapoints regardless of the query window.
    struct Canned(Vec<Datapoint>);

    impl MetricSource for Canned {
        fn statistics<'a>(
            &'a self,
            _query: &'a MetricQuery,
        ) -> BoxFuture<'a, Result<Vec<Datapoint>, MetricError>> {
            let points = self.0.clone();
            Box::pin(async move { Ok(points) })
        }
    }

    #[tokio::test]
    async fn averages_across_readers() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_sample("r1", "CPUUtilization", NOW - 60, 80.0).unwrap();
        store.put_sample("r2", "CPUUtilization", NOW - 60, 40.0).unwrap();

        let sampler = MetricSampler::new(&store, "CPUUtilization");
        let sample = sampler
            .sample_at(&[reader("r1"), reader("r2")], NOW)
            .await
            .unwrap();

        assert_eq!(sample.average, 60.0);
        assert_eq!(
            sample.per_node,
            vec![("r1".to_string(), 80.0), ("r2".to_string(), 40.0)]
        );
    }

    #[tokio::test]
    async fn ignores_samples_outside_window() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_sample("r1", "CPUUtilization", NOW - 600, 99.0).unwrap();
        store.put_sample("r1", "CPUUtilization", NOW - 10, 20.0).unwrap();

        let sampler = MetricSampler::new(&store, "CPUUtilization");
        let sample = sampler.sample_at(&[reader("r1")], NOW).await.unwrap();
        assert_eq!(sample.average, 20.0);
    }

    #[tokio::test]
    async fn reader_without_datapoints_fails_whole_sample() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_sample("r1", "CPUUtilization", NOW - 60, 80.0).unwrap();

        let sampler = MetricSampler::new(&store, "CPUUtilization");
        let err = sampler
            .sample_at(&[reader("r1"), reader("r2")], NOW)
            .await
            .unwrap_err();
        assert_eq!(err, MetricError::NoDatapoints("r2".to_string()));
    }

    #[tokio::test]
    async fn no_readers_is_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        let sampler = MetricSampler::new(&store, "CPUUtilization");
        assert_eq!(
            sampler.sample_at(&[], NOW).await.unwrap_err(),
            MetricError::NoReaders
        );
    }

    #[tokio::test]
    async fn latest_datapoint_wins() {
        let source = Canned(vec![
            Datapoint { timestamp: 300, average: 90.0 },
            Datapoint { timestamp: 0, average: 10.0 },
        ]);
        let sampler = MetricSampler::new(&source, "CPUUtilization");
        let sample = sampler.sample_at(&[reader("r1")], NOW).await.unwrap();
        assert_eq!(sample.average, 90.0);
    }
}
