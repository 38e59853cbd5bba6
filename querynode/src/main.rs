//! querynode binary entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use querynode::{init_home, run, StartOptions};
use shared::logging::{init_tracing, log_error};
use shared::ProcessRole;

#[derive(Parser)]
#[command(name = "querynode")]
#[command(about = "Test node serving named query services")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a node home directory
    Init {
        /// Node home directory
        #[arg(long)]
        home: PathBuf,

        #[arg(long, default_value = "querynode-test")]
        chain_id: String,

        #[arg(long, default_value = "node0")]
        moniker: String,

        /// Replace an existing home config
        #[arg(long)]
        overwrite: bool,
    },

    /// Serve the query endpoint until SIGINT/SIGTERM
    Start {
        /// Node home directory (must be initialized)
        #[arg(long)]
        home: PathBuf,

        /// Query endpoint bind address
        #[arg(long, default_value = "127.0.0.1:9090")]
        query_addr: SocketAddr,

        /// Wait this long before binding the query endpoint
        #[arg(long, default_value = "0")]
        startup_delay_ms: u64,

        /// Never open the query endpoint
        #[arg(long)]
        no_listen: bool,

        /// Keep running when SIGTERM arrives
        #[arg(long)]
        ignore_sigterm: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(ProcessRole::Node, Some(&cli.log_level));

    let result = match cli.command {
        Command::Init {
            home,
            chain_id,
            moniker,
            overwrite,
        } => init_home(&home, &chain_id, &moniker, overwrite)
            .map(|_| ())
            .with_context(|| format!("init of {} failed", home.display())),
        Command::Start {
            home,
            query_addr,
            startup_delay_ms,
            no_listen,
            ignore_sigterm,
        } => run(StartOptions {
            home: home.clone(),
            query_addr,
            startup_delay: Duration::from_millis(startup_delay_ms),
            listen: !no_listen,
            ignore_sigterm,
        })
        .await
        .with_context(|| format!("node with home {} failed", home.display())),
    };

    if let Err(e) = &result {
        log_error(ProcessRole::Node, "querynode", &format!("{e:#}"));
    }
    result
}
