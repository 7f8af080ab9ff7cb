//! podgridd — the podgrid daemon.
//!
//! Single binary with two roles:
//! - `serve`: state store, cluster manager, failure detector and REST API
//! - `agent`: heartbeat loop for one node (started by a launcher)
//!
//! # Usage
//!
//! ```text
//! podgridd serve --port 8080 --data-dir /var/lib/podgrid --launcher process
//! podgridd agent --node-id <uuid> --server http://127.0.0.1:8080
//! ```

mod agent_mode;
mod config;
mod control_plane;

use std::time::Duration;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{PodgridConfig, ServeArgs, ServeSettings, parse_duration};

#[derive(Parser)]
#[command(name = "podgridd", about = "podgrid cluster manager daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the cluster manager and REST API.
    Serve(ServeArgs),

    /// Heartbeat on behalf of a node.
    Agent {
        /// Node to heartbeat for.
        #[arg(long, env = "NODE_ID")]
        node_id: String,

        /// Base URL of the podgrid server.
        #[arg(long, env = "API_SERVER_URL")]
        server: String,

        /// Time between heartbeats (e.g. "5s", "500ms").
        #[arg(long, default_value = "5s", value_parser = parse_interval)]
        interval: Duration,
    },
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration: {s}"))
}

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,podgridd=debug,podgrid_state=debug,\
    podgrid_placement=debug,podgrid_health=debug,podgrid_cluster=debug,podgrid_api=debug";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => {
            let file = match &args.config {
                Some(path) => PodgridConfig::from_file(path)?,
                None => PodgridConfig::default(),
            };
            let settings = ServeSettings::resolve(args, file)?;
            control_plane::run_control_plane(settings).await
        }
        Command::Agent {
            node_id,
            server,
            interval,
        } => {
            if interval.is_zero() {
                return Err(anyhow!("--interval must be greater than zero"));
            }
            agent_mode::run_agent(node_id, server, interval).await
        }
    }
}
