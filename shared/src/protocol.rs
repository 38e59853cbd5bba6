//! Query wire protocol
//!
//! Every frame on the query endpoint is a 4-byte little-endian length prefix
//! followed by a bincode body. Requests address a handler by service and
//! method name; the payload bytes are opaque at this layer and are encoded
//! with [`encode_payload`] / [`decode_payload`] by typed clients and handlers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{SharedError, SharedResult};

/// Largest frame either side will accept
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Request addressed to `service`/`method` on the node
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryRequest {
    pub id: u64,
    pub service: String,
    pub method: String,
    pub payload: Vec<u8>,
}

/// Response correlated to a request by `id`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryResponse {
    pub id: u64,
    pub outcome: QueryOutcome,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Ok(Vec<u8>),
    Err(Status),
}

/// Application-level failure reported by a service handler
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    Unimplemented,
    Internal,
    Unavailable,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::NotFound => "not_found",
            StatusCode::Unimplemented => "unimplemented",
            StatusCode::Internal => "internal",
            StatusCode::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Encode a service message into payload bytes
pub fn encode_payload<T: Serialize>(message: &T) -> SharedResult<Vec<u8>> {
    bincode::serialize(message).map_err(|e| SharedError::SerializationError {
        message: e.to_string(),
    })
}

/// Decode payload bytes into a service message
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> SharedResult<T> {
    bincode::deserialize(payload).map_err(|e| SharedError::DeserializationError {
        message: e.to_string(),
    })
}

/// Encode a message as one length-prefixed frame without touching any stream
pub fn encode_frame<T: Serialize>(message: &T) -> SharedResult<Vec<u8>> {
    let body = encode_payload(message)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(SharedError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Write one length-prefixed frame and flush it
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> SharedResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closed the stream before a new frame began.
/// A stream ending anywhere inside a frame, prefix included, is a `ProtocolError`.
pub async fn read_frame<R, T>(reader: &mut R) -> SharedResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    if reader.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SharedError::ProtocolError {
                message: "stream ended inside a frame length prefix".to_string(),
            }
        } else {
            SharedError::Io(e)
        }
    })?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(SharedError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SharedError::ProtocolError {
                message: format!("stream ended inside a {len} byte frame"),
            }
        } else {
            SharedError::Io(e)
        }
    })?;

    decode_payload(&body).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_request_frame_survives_the_wire() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let request = QueryRequest {
            id: 7,
            service: "testdata.TestService".to_string(),
            method: "Echo".to_string(),
            payload: vec![1, 2, 3],
        };

        write_frame(&mut client, &request).await.unwrap();
        let received: Option<QueryRequest> = read_frame(&mut server).await.unwrap();

        assert_eq!(received, Some(request));
    }

    #[tokio::test]
    async fn test_clean_eof_reads_as_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let received: Option<QueryRequest> = read_frame(&mut server).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_protocol_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(&[0u8; 3]).await.unwrap();
        drop(client);

        let result: SharedResult<Option<QueryRequest>> = read_frame(&mut server).await;
        assert_matches!(result, Err(SharedError::ProtocolError { .. }));
    }

    #[tokio::test]
    async fn test_truncated_length_prefix_is_protocol_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[7u8, 0]).await.unwrap();
        drop(client);

        let result: SharedResult<Option<QueryRequest>> = read_frame(&mut server).await;
        assert_matches!(result, Err(SharedError::ProtocolError { message }) if message.contains("length prefix"));
    }

    #[test]
    fn test_encode_frame_rejects_oversized_body() {
        let result = encode_frame(&vec![0u8; MAX_FRAME_LEN + 1]);
        assert_matches!(result, Err(SharedError::FrameTooLarge { max: MAX_FRAME_LEN, .. }));

        let frame = encode_frame(&"ok".to_string()).unwrap();
        assert_eq!(u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize, frame.len() - 4);
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32) + 1;
        client.write_all(&len.to_le_bytes()).await.unwrap();

        let result: SharedResult<Option<QueryRequest>> = read_frame(&mut server).await;
        assert_matches!(result, Err(SharedError::FrameTooLarge { .. }));
    }

    #[test]
    fn test_decode_garbage_payload_fails() {
        let result: SharedResult<String> = decode_payload(&[0xff, 0xff]);
        assert_matches!(result, Err(SharedError::DeserializationError { .. }));
    }

    #[test]
    fn test_status_display() {
        let status = Status::unimplemented("no method Missing");
        assert_eq!(status.to_string(), "unimplemented: no method Missing");
    }
}
