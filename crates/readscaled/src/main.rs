//! readscaled — the read-replica autoscaler binary.
//!
//! Runs one reconciliation per trigger against the embedded directory, and
//! offers a few commands to inspect and seed that directory.
//!
//! # Usage
//!
//! ```text
//! readscaled seed orders --writer orders-primary --instance-class db.r6g.large
//! readscaled record-metric orders-reader-1 --metric CPUUtilization 72.5
//! CLUSTER_IDENTIFIER=orders MIN_CAPACITY=1 MAX_CAPACITY=5 \
//!   METRIC_NAME=CPUUtilization TARGET_VALUE=50 readscaled invoke --event alarm.json
//! readscaled nodes orders
//! ```

mod inventory;
mod invoke;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "readscaled", about = "Read-replica autoscaler")]
struct Cli {
    /// State file holding the cluster directory and metric samples.
    #[arg(long, global = true, default_value = "readscale.redb")]
    state: PathBuf,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run one invocation from a trigger payload (file or stdin).
    Invoke {
        /// Trigger payload file. Reads stdin when absent.
        #[arg(long)]
        event: Option<PathBuf>,

        /// TOML config file. Environment variables override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop retrying after this many seconds.
        #[arg(long)]
        deadline: Option<u64>,
    },

    /// List the nodes of a cluster with role, status and ownership.
    Nodes {
        cluster: String,
    },

    /// Register a cluster and its writer node.
    Seed {
        cluster: String,

        #[arg(long)]
        writer: String,

        #[arg(long, default_value = "db.r6g.large")]
        instance_class: String,
    },

    /// Record a utilization sample for a node.
    RecordMetric {
        node: String,

        #[arg(long, default_value = "CPUUtilization")]
        metric: String,

        value: f64,

        /// Unix seconds; defaults to now.
        #[arg(long)]
        timestamp: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Invoke {
            event,
            config,
            deadline,
        } => {
            invoke::run(invoke::InvokeArgs {
                state: cli.state,
                event,
                config,
                deadline,
            })
            .await
        }
        Command::Nodes { cluster } => inventory::print_nodes(&cli.state, &cluster),
        Command::Seed {
            cluster,
            writer,
            instance_class,
        } => inventory::seed(&cli.state, &cluster, &writer, &instance_class),
        Command::RecordMetric {
            node,
            metric,
            value,
            timestamp,
        } => inventory::record_metric(&cli.state, &node, &metric, value, timestamp),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,readscale=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
