//! deferq: delayed-job dispatcher
//!
//! Main binary with subcommands:
//! - `daemon`: Poll the delay sets and move due jobs onto work queues
//! - `schedule`: Add a job payload to a delay set

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daemon;
mod schedule;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "deferq=info,deferq_scheduler=info,deferq_redis=info";

#[derive(Parser)]
#[command(name = "deferq")]
#[command(about = "Delayed-job dispatcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatcher until interrupted
    Daemon {
        /// Redis URL
        #[arg(long, env = "DEFERQ_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,

        /// Key namespace shared by every process of the cluster
        #[arg(long, env = "DEFERQ_NAMESPACE")]
        namespace: Option<String>,

        /// Fixed mean seconds between scans (disables cluster-size scaling)
        #[arg(long, env = "DEFERQ_POLL_INTERVAL_AVERAGE")]
        poll_interval_average: Option<f64>,

        /// Desired seconds between scans across the whole cluster
        #[arg(long, env = "DEFERQ_AVERAGE_POLL_INTERVAL", default_value = "5")]
        average_poll_interval: f64,

        /// Delay sets to drain, in order
        #[arg(long = "set", default_values = ["retry", "schedule"])]
        sets: Vec<String>,
    },

    /// Add a job to a delay set
    Schedule {
        /// Redis URL
        #[arg(long, env = "DEFERQ_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,

        /// Key namespace shared by every process of the cluster
        #[arg(long, env = "DEFERQ_NAMESPACE")]
        namespace: Option<String>,

        /// Delay set to add the job to
        #[arg(long, default_value = "schedule")]
        set: String,

        /// Seconds from now until the job is due
        #[arg(long = "in", default_value = "0")]
        delay: f64,

        /// Job payload as JSON (must contain "class")
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            redis_url,
            namespace,
            poll_interval_average,
            average_poll_interval,
            sets,
        } => {
            daemon::run(daemon::DaemonConfig {
                redis_url,
                namespace,
                poll_interval_average,
                average_poll_interval,
                sets,
            })
            .await
        }

        Commands::Schedule {
            redis_url,
            namespace,
            set,
            delay,
            payload,
        } => schedule::run(&redis_url, namespace, &set, delay, &payload).await,
    }
}
