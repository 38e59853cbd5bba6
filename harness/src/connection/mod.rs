//! Query Connection
//!
//! A reusable, service-agnostic handle to a node's query endpoint. Typed
//! clients marshal their messages and call [`QueryConnection::invoke`]; the
//! connection itself knows nothing about any particular service.

pub mod tcp;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use shared::{decode_payload, encode_payload, QueryOutcome, QueryRequest, QueryResponse};

use crate::error::{HarnessError, HarnessResult};
pub use tcp::TcpTransport;

/// Request/response transport to a node.
///
/// Transport-level failures must be reported as `TransportError` and leave
/// the connection marked broken; remote failures travel inside the response
/// outcome. Requests rejected before reaching the wire use other variants.
#[mockall::automock]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response
    async fn round_trip(&self, request: QueryRequest) -> HarnessResult<QueryResponse>;

    /// Release the session; must not block
    fn close(&self);

    /// Human-readable peer description
    fn peer(&self) -> String;
}

/// Timeouts for opening and using a connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle to a query session. Clones share the same session.
#[derive(Clone)]
pub struct QueryConnection {
    inner: Arc<Inner>,
}

struct Inner {
    target: String,
    transport: Box<dyn Transport>,
    closed: AtomicBool,
    /// Set once a transport failure has made the session unusable
    broken: AtomicBool,
    next_id: AtomicU64,
}

impl std::fmt::Debug for QueryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryConnection")
            .field("target", &self.inner.target)
            .field("closed", &self.is_closed())
            .field("broken", &self.inner.broken.load(Ordering::SeqCst))
            .finish()
    }
}

impl QueryConnection {
    /// Open a TCP session to a node's query endpoint
    pub async fn open(addr: SocketAddr, options: ConnectOptions) -> HarnessResult<Self> {
        let transport = TcpTransport::connect(addr, options.connect_timeout, options.call_timeout).await?;
        Ok(Self::with_transport(Box::new(transport)))
    }

    /// Wrap any transport
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                target: transport.peer(),
                transport,
                closed: AtomicBool::new(false),
                broken: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn target(&self) -> &str {
        &self.inner.target
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Open and not broken by a transport failure
    pub fn is_usable(&self) -> bool {
        !self.is_closed() && !self.inner.broken.load(Ordering::SeqCst)
    }

    /// Whether two handles share one session
    pub fn same_session(&self, other: &QueryConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Call `service`/`method` with an encoded payload
    pub async fn invoke(&self, service: &str, method: &str, payload: Vec<u8>) -> HarnessResult<Vec<u8>> {
        if self.is_closed() {
            return Err(HarnessError::Closed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let request = QueryRequest {
            id,
            service: service.to_string(),
            method: method.to_string(),
            payload,
        };
        debug!(id, "📤 {}/{} -> {}", service, method, self.inner.target);

        let response = match self.inner.transport.round_trip(request).await {
            Ok(response) => response,
            Err(_) if self.is_closed() => return Err(HarnessError::Closed),
            Err(e) => {
                if matches!(e, HarnessError::TransportError { .. }) {
                    self.mark_broken(&e);
                }
                return Err(e);
            }
        };

        if response.id != id {
            let e = HarnessError::transport(format!(
                "response id {} does not match request id {}",
                response.id, id
            ));
            self.mark_broken(&e);
            return Err(e);
        }

        match response.outcome {
            QueryOutcome::Ok(payload) => Ok(payload),
            QueryOutcome::Err(status) => Err(HarnessError::RemoteError {
                service: service.to_string(),
                method: method.to_string(),
                code: status.code,
                message: status.message,
            }),
        }
    }

    /// Call with serde messages using the wire payload codec
    pub async fn invoke_typed<Req, Resp>(&self, service: &str, method: &str, request: &Req) -> HarnessResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = encode_payload(request)?;
        let response = self.invoke(service, method, payload).await?;
        Ok(decode_payload(&response)?)
    }

    fn mark_broken(&self, cause: &HarnessError) {
        if !self.inner.broken.swap(true, Ordering::SeqCst) {
            warn!("💔 Query connection to {} is broken: {}", self.inner.target, cause);
        }
    }

    /// Release the session. Idempotent.
    pub fn close(&self) -> HarnessResult<()> {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.transport.close();
            debug!("🔒 Query connection to {} closed", self.inner.target);
        }
        Ok(())
    }
}
