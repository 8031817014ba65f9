//! The `invoke` command: config → trigger → retried reconciliations.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use readscale_autoscale::{ReconcileOutcome, Reconciler, RetryError, execute_with_retry};
use readscale_core::trigger::{self, ScalingCommand, Trigger};
use readscale_core::{ClusterConfig, Notifier, ScaleEvent, ScalingDecision, ScalingMode};
use readscale_notify::{LogNotifier, WebhookNotifier};
use readscale_state::StateStore;

/// Action named in failure notifications.
const FAILED_ACTION: &str = "execute scaling action";

pub struct InvokeArgs {
    pub state: PathBuf,
    pub event: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub deadline: Option<u64>,
}

pub async fn run(args: InvokeArgs) -> anyhow::Result<()> {
    let config = ClusterConfig::load(args.config.as_deref()).context("invalid configuration")?;
    info!(
        cluster = %config.cluster_id,
        mode = %config.mode.kind(),
        min = config.min_capacity,
        max = config.max_capacity,
        dry_run = config.dry_run,
        "configuration loaded"
    );

    let payload = read_payload(args.event.as_deref())?;
    let trigger = trigger::decode(&payload).context("failed to decode trigger")?;

    let store = StateStore::open(&args.state)
        .with_context(|| format!("failed to open state file {}", args.state.display()))?;
    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => Arc::new(LogNotifier),
    };
    let reconciler = Reconciler::new(Arc::new(store.clone()), Arc::new(store), notifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = ctrl_c_tx.send(true);
        }
    });
    if let Some(secs) = args.deadline {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(deadline_secs = secs, "invocation deadline reached");
            let _ = shutdown_tx.send(true);
        });
    }

    let summary = handle_trigger(&reconciler, &config, trigger, shutdown_rx).await?;
    if config.dry_run {
        summary.log(&config.cluster_id);
    }
    Ok(())
}

/// Process every command of `trigger` in order, each under the retry
/// policy. The first command that exhausts its attempts fails the
/// invocation after a failure notification.
pub async fn handle_trigger(
    reconciler: &Reconciler,
    config: &ClusterConfig,
    trigger: Trigger,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<DryRunSummary> {
    let mut summary = DryRunSummary::default();

    if trigger == Trigger::Unsupported {
        warn!("unsupported trigger payload, nothing to do");
        return Ok(summary);
    }

    for command in trigger.commands() {
        debug!(
            message_id = command.message_id.as_deref().unwrap_or("-"),
            scaling_type = command.scaling_type.as_deref().unwrap_or("-"),
            "processing scaling command"
        );
        let effective = apply_override(config, &command);

        let result = execute_with_retry(&effective.retry, &mut shutdown, |attempt| {
            debug!(attempt, cluster = %effective.cluster_id, "reconcile attempt");
            reconciler.reconcile(&effective)
        })
        .await;

        match result {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                report_failure(reconciler, config, &e).await;
                return Err(e).context(format!("scaling cluster {}", config.cluster_id));
            }
        }
    }

    Ok(summary)
}

/// The config a single command runs with.
fn apply_override(config: &ClusterConfig, command: &ScalingCommand) -> ClusterConfig {
    match (command.replica_override, &config.mode) {
        (Some(replicas), ScalingMode::Scheduled(schedule)) => {
            info!(
                configured = schedule.replica_delta,
                replicas,
                "using replica count from trigger"
            );
            config.with_replica_override(replicas)
        }
        (Some(replicas), ScalingMode::Metric(_)) => {
            warn!(replicas, "replica count ignored in metric mode");
            config.clone()
        }
        (None, _) => config.clone(),
    }
}

async fn report_failure<E: std::fmt::Display>(
    reconciler: &Reconciler,
    config: &ClusterConfig,
    err: &RetryError<E>,
) {
    error!(cluster = %config.cluster_id, attempts = err.attempts(), error = %err, "scaling failed");
    reconciler
        .notify(&ScaleEvent::Failed {
            cluster_id: config.cluster_id.clone(),
            action: FAILED_ACTION.to_string(),
            error: err.to_string(),
        })
        .await;
}

fn read_payload(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read trigger file {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read trigger from stdin")?;
            Ok(buf)
        }
    }
}

/// Totals of what a dry-run invocation would have done.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DryRunSummary {
    pub to_add: u32,
    pub to_remove: u32,
    pub node_ids: Vec<String>,
}

impl DryRunSummary {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        if !outcome.dry_run {
            return;
        }
        match outcome.decision {
            ScalingDecision::ScaleOut(_) => self.to_add += outcome.applied,
            ScalingDecision::ScaleIn(_) => self.to_remove += outcome.applied,
            ScalingDecision::NoOp => {}
        }
        self.node_ids.extend(outcome.node_ids.iter().cloned());
    }

    fn log(&self, cluster_id: &str) {
        info!(
            cluster = %cluster_id,
            replicas_to_add = self.to_add,
            replicas_to_remove = self.to_remove,
            nodes = ?self.node_ids,
            "dry run summary"
        );
    }
}
