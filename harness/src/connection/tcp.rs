//! TCP transport speaking the length-prefixed bincode query protocol

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use shared::{encode_frame, read_frame, QueryRequest, QueryResponse};

use super::Transport;
use crate::error::{HarnessError, HarnessResult};

/// One TCP session; calls are serialized over it.
///
/// A session that times out or breaks once I/O has started is discarded so a
/// late response can never be read as the answer to a later request. A request
/// that cannot be encoded fails before the stream is touched.
pub struct TcpTransport {
    peer: SocketAddr,
    stream: Mutex<Option<TcpStream>>,
    call_timeout: Duration,
    closed: AtomicBool,
}

impl TcpTransport {
    pub async fn connect(addr: SocketAddr, connect_timeout: Duration, call_timeout: Duration) -> HarnessResult<Self> {
        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(HarnessError::ConnectFailed {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(HarnessError::ConnectFailed {
                    addr,
                    reason: format!("no connection within {connect_timeout:?}"),
                })
            }
        };
        let _ = stream.set_nodelay(true);
        debug!("🔌 Connected query transport to {}", addr);

        Ok(Self {
            peer: addr,
            stream: Mutex::new(Some(stream)),
            call_timeout,
            closed: AtomicBool::new(false),
        })
    }

    async fn exchange(stream: &mut TcpStream, frame: &[u8]) -> HarnessResult<QueryResponse> {
        stream
            .write_all(frame)
            .await
            .map_err(|e| HarnessError::transport(format!("send failed: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| HarnessError::transport(format!("send failed: {e}")))?;

        match read_frame::<_, QueryResponse>(stream).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(HarnessError::transport("connection dropped by peer")),
            Err(e) => Err(HarnessError::transport(format!("receive failed: {e}"))),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn round_trip(&self, request: QueryRequest) -> HarnessResult<QueryResponse> {
        let frame = encode_frame(&request)?;

        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(HarnessError::transport(format!("session to {} is no longer usable", self.peer)));
        };

        let result = match tokio::time::timeout(self.call_timeout, Self::exchange(stream, &frame)).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::transport(format!(
                "{}/{} timed out after {:?}",
                request.service, request.method, self.call_timeout
            ))),
        };

        if result.is_err() || self.closed.load(Ordering::SeqCst) {
            guard.take();
        }
        result
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // an in-flight call drops the stream itself when it finishes
        if let Ok(mut guard) = self.stream.try_lock() {
            guard.take();
        }
        debug!("🔌 Closed query transport to {}", self.peer);
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
