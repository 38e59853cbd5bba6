//! Node lifecycle: home initialization and the `start` run loop

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use shared::logging::{log_shutdown, log_startup};
use shared::ProcessRole;

use crate::config::NodeHomeConfig;
use crate::error::NodeResult;
use crate::server::QueryServer;
use crate::services::{default_registry, NodeContext};

/// Options of `querynode start`
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub home: PathBuf,
    pub query_addr: SocketAddr,
    /// Delay before the query endpoint is bound
    pub startup_delay: Duration,
    /// When false the endpoint is never opened
    pub listen: bool,
    pub ignore_sigterm: bool,
}

/// Write a fresh home config
pub fn init_home(home: &Path, chain_id: &str, moniker: &str, overwrite: bool) -> NodeResult<PathBuf> {
    let config = NodeHomeConfig::new(chain_id, moniker)?;
    let path = config.save(home, overwrite)?;
    info!("📁 Initialized home {} for chain {}", home.display(), chain_id);
    Ok(path)
}

/// Run the node until SIGINT or SIGTERM
pub async fn run(options: StartOptions) -> NodeResult<()> {
    let mut shutdown = ShutdownSignal::install(options.ignore_sigterm);

    let home_config = NodeHomeConfig::load(&options.home)?;
    log_startup(
        ProcessRole::Node,
        &format!("{} on chain {}", home_config.moniker, home_config.chain_id),
    );

    let registry = default_registry(NodeContext {
        chain_id: home_config.chain_id.clone(),
        moniker: home_config.moniker.clone(),
        home: options.home.display().to_string(),
    });

    if !options.startup_delay.is_zero() {
        info!("⏳ Delaying query endpoint by {:?}", options.startup_delay);
        tokio::select! {
            _ = tokio::time::sleep(options.startup_delay) => {}
            _ = shutdown.recv() => {
                log_shutdown(ProcessRole::Node, "signal received during startup delay");
                return Ok(());
            }
        }
    }

    if !options.listen {
        warn!("🔇 Query endpoint disabled; waiting for shutdown");
        shutdown.recv().await;
        log_shutdown(ProcessRole::Node, "signal received");
        return Ok(());
    }

    let listener = QueryServer::bind(options.query_addr).await?;
    QueryServer::new(registry).serve(listener, shutdown.recv()).await?;

    log_shutdown(ProcessRole::Node, "signal received");
    Ok(())
}

/// Termination signals, registered eagerly so none is missed during startup
struct ShutdownSignal {
    ignore_sigterm: bool,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignal {
    fn install(ignore_sigterm: bool) -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let terminate = match signal(SignalKind::terminate()) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    warn!("⚠️ Failed to install SIGTERM handler: {}", e);
                    None
                }
            };
            Self {
                ignore_sigterm,
                terminate,
            }
        }

        #[cfg(not(unix))]
        {
            Self { ignore_sigterm }
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            let ignore_sigterm = self.ignore_sigterm;
            let terminate = &mut self.terminate;
            loop {
                let terminated = async {
                    match terminate.as_mut() {
                        Some(stream) => {
                            stream.recv().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("📤 Received SIGINT");
                        return;
                    }
                    _ = terminated => {
                        if ignore_sigterm {
                            warn!("🙉 Ignoring SIGTERM (--ignore-sigterm)");
                            continue;
                        }
                        info!("📤 Received SIGTERM");
                        return;
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.ignore_sigterm;
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
