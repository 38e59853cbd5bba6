//! Node error types

use shared::SharedError;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Home config not found at {path}; run `querynode init` first")]
    HomeNotInitialized { path: String },

    #[error("Home config already exists at {path}")]
    HomeAlreadyInitialized { path: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Failed to bind query endpoint {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type NodeResult<T> = Result<T, NodeError>;
