//! Shared error types for the query wire protocol

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Message protocol error: {message}")]
    ProtocolError { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SharedResult<T> = Result<T, SharedError>;
