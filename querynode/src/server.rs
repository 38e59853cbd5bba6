//! Query endpoint server
//!
//! Each accepted connection runs a sequential request/response loop over
//! length-prefixed frames until the peer hangs up.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use shared::{read_frame, write_frame, QueryRequest, QueryResponse};

use crate::error::{NodeError, NodeResult};
use crate::registry::ServiceRegistry;

pub struct QueryServer {
    registry: Arc<ServiceRegistry>,
}

impl QueryServer {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Bind the query endpoint
    pub async fn bind(addr: SocketAddr) -> NodeResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| NodeError::BindFailed { addr, source })
    }

    /// Accept connections until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> NodeResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("📡 Query server listening on {}", local_addr);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Query server on {} stopping", local_addr);
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!("🔌 Accepted query connection from {}", peer);
                            let registry = self.registry.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, registry).await {
                                    warn!("⚠️ Query connection from {} ended with error: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("⚠️ Failed to accept query connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(mut stream: TcpStream, registry: Arc<ServiceRegistry>) -> NodeResult<()> {
    while let Some(request) = read_frame::<_, QueryRequest>(&mut stream).await? {
        debug!(
            id = request.id,
            "📥 {}/{} ({} bytes)",
            request.service,
            request.method,
            request.payload.len()
        );

        let outcome = registry.dispatch(&request);
        let response = QueryResponse { id: request.id, outcome };
        write_frame(&mut stream, &response).await?;
    }

    Ok(())
}
