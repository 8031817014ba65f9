//! Reconciler — one scaling decision and its execution per invocation.
//!
//! Dispatches on [`ScalingMode`]: metric mode sizes the reader fleet from
//! utilization, scheduled mode toggles a fixed block of readers in and out.
//! Notifications are fire-and-forget and suppressed under dry-run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use readscale_core::{
    ClusterConfig, Directory, MetricModeConfig, MetricSource, ModeKind, NodeId, Notifier,
    ScaleEvent, ScalingDecision, ScalingMode, ScheduleModeConfig,
};
use readscale_metrics::MetricSampler;

use crate::capacity::{desired_capacity, scheduled_additions};
use crate::error::ReconcileError;
use crate::ownership;
use crate::provisioner::Provisioner;
use crate::topology::{self, Topology};

/// What one reconciliation decided and what it actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub decision: ScalingDecision,
    /// Readers created or removed (or that would be, under dry-run).
    pub applied: u32,
    pub node_ids: Vec<NodeId>,
    pub dry_run: bool,
}

impl ReconcileOutcome {
    fn noop(dry_run: bool) -> Self {
        Self {
            decision: ScalingDecision::NoOp,
            applied: 0,
            node_ids: Vec::new(),
            dry_run,
        }
    }

    fn applied(decision: ScalingDecision, node_ids: Vec<NodeId>, dry_run: bool) -> Self {
        Self {
            decision,
            applied: u32::try_from(node_ids.len()).unwrap_or(u32::MAX),
            node_ids,
            dry_run,
        }
    }
}

/// The decision engine, wired to its collaborators.
#[derive(Clone)]
pub struct Reconciler {
    directory: Arc<dyn Directory>,
    metrics: Arc<dyn MetricSource>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(
        directory: Arc<dyn Directory>,
        metrics: Arc<dyn MetricSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            directory,
            metrics,
            notifier,
        }
    }

    /// Run one reconciliation of `config.cluster_id`.
    pub async fn reconcile(&self, config: &ClusterConfig) -> Result<ReconcileOutcome, ReconcileError> {
        info!(
            cluster = %config.cluster_id,
            mode = %config.mode.kind(),
            dry_run = config.dry_run,
            "reconciling"
        );
        match &config.mode {
            ScalingMode::Metric(metric) => self.reconcile_metric(config, metric).await,
            ScalingMode::Scheduled(schedule) => self.reconcile_scheduled(config, schedule).await,
        }
    }

    /// Send a scale event, logging (never returning) failures.
    pub async fn notify(&self, event: &ScaleEvent) {
        if let Err(e) = self.notifier.notify(event).await {
            warn!(cluster = %event.cluster_id(), error = %e, "failed to send notification");
        }
    }

    async fn reconcile_metric(
        &self,
        config: &ClusterConfig,
        metric: &MetricModeConfig,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let topology = topology::resolve(self.directory.as_ref(), &config.cluster_id).await?;

        let sample = MetricSampler::new(self.metrics.as_ref(), &metric.metric_name)
            .sample(&topology.readers)
            .await?;
        let current = topology.reader_count();
        let desired = desired_capacity(
            sample.average,
            current,
            metric.target_value,
            config.min_capacity,
            config.max_capacity,
        );

        info!(
            cluster = %config.cluster_id,
            metric = %metric.metric_name,
            value = sample.average,
            target = metric.target_value,
            current,
            desired,
            "desired capacity calculated"
        );

        let provisioner = Provisioner::new(self.directory.as_ref(), config);

        if desired > current {
            let decision = ScalingDecision::ScaleOut(desired - current);
            let created = provisioner
                .create_readers(
                    ModeKind::Metric,
                    desired - current,
                    instance_class(config, &topology),
                )
                .await?;
            let outcome = ReconcileOutcome::applied(decision, created, config.dry_run);
            self.report(config, &outcome).await;
            Ok(outcome)
        } else if desired < current {
            // One reader per invocation, whatever the gap.
            let decision = ScalingDecision::ScaleIn(1);
            let removed = provisioner.remove_first_owned(&topology.readers).await?;
            let outcome =
                ReconcileOutcome::applied(decision, removed.into_iter().collect(), config.dry_run);
            self.report(config, &outcome).await;
            Ok(outcome)
        } else {
            debug!(cluster = %config.cluster_id, current, "capacity on target");
            Ok(ReconcileOutcome::noop(config.dry_run))
        }
    }

    async fn reconcile_scheduled(
        &self,
        config: &ClusterConfig,
        schedule: &ScheduleModeConfig,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let topology = topology::resolve(self.directory.as_ref(), &config.cluster_id).await?;

        let mut owned = Vec::new();
        for reader in &topology.readers {
            if ownership::is_owned(self.directory.as_ref(), reader, ModeKind::Scheduled).await? {
                owned.push(reader.clone());
            }
        }
        info!(
            cluster = %config.cluster_id,
            readers = topology.readers.len(),
            scheduled = owned.len(),
            "scheduled readers counted"
        );

        let provisioner = Provisioner::new(self.directory.as_ref(), config);

        if !owned.is_empty() {
            // Currently scaled out: remove the whole scheduled block.
            let removed = provisioner.remove_owned(&owned).await?;
            let decision = ScalingDecision::ScaleIn(u32::try_from(removed.len()).unwrap_or(u32::MAX));
            let outcome = ReconcileOutcome::applied(decision, removed, config.dry_run);
            self.report(config, &outcome).await;
            return Ok(outcome);
        }

        let current = topology.reader_count();
        let additions = scheduled_additions(
            current,
            schedule.replica_delta,
            config.min_capacity,
            config.max_capacity,
        );
        if additions == 0 {
            info!(
                cluster = %config.cluster_id,
                current,
                delta = schedule.replica_delta,
                max = config.max_capacity,
                "no replicas to add"
            );
            return Ok(ReconcileOutcome::noop(config.dry_run));
        }
        if i64::from(additions) != i64::from(schedule.replica_delta) {
            warn!(
                cluster = %config.cluster_id,
                delta = schedule.replica_delta,
                adjusted = additions,
                "replica delta adjusted to capacity bounds"
            );
        }

        let created = provisioner
            .create_readers(
                ModeKind::Scheduled,
                additions,
                instance_class(config, &topology),
            )
            .await?;
        let outcome =
            ReconcileOutcome::applied(ScalingDecision::ScaleOut(additions), created, config.dry_run);
        self.report(config, &outcome).await;
        Ok(outcome)
    }

    /// Notify about an applied action. Dry runs and empty actions are silent.
    async fn report(&self, config: &ClusterConfig, outcome: &ReconcileOutcome) {
        if outcome.applied == 0 {
            return;
        }
        if outcome.dry_run {
            debug!(cluster = %config.cluster_id, "dry run: notification suppressed");
            return;
        }
        let event = match outcome.decision {
            ScalingDecision::ScaleOut(_) => ScaleEvent::ScaledOut {
                cluster_id: config.cluster_id.clone(),
                added: outcome.applied,
            },
            ScalingDecision::ScaleIn(_) => ScaleEvent::ScaledIn {
                cluster_id: config.cluster_id.clone(),
                removed: outcome.applied,
            },
            ScalingDecision::NoOp => return,
        };
        self.notify(&event).await;
    }
}

fn instance_class<'a>(config: &'a ClusterConfig, topology: &'a Topology) -> &'a str {
    topology.instance_class_for(config.instance_class.as_deref())
}
