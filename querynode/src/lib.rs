//! Test node for the query harness
//!
//! A small stand-in for a real node binary: it prepares a home directory and
//! serves named services over the query endpoint so end-to-end tests have a
//! real external process to drive.

pub mod config;
pub mod error;
pub mod node;
pub mod registry;
pub mod server;
pub mod services;

pub use config::NodeHomeConfig;
pub use error::{NodeError, NodeResult};
pub use node::{init_home, run, StartOptions};
pub use registry::ServiceRegistry;
pub use server::QueryServer;
