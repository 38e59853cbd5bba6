//! Node Test Harness
//!
//! Spins up a real node process per test, waits until its query endpoint is
//! serving, hands out a reusable query connection and guarantees teardown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use harness::*;
//! use shared::testdata::EchoRequest;
//!
//! # async fn example() -> HarnessResult<()> {
//! let config = FixtureConfig::builder()
//!     .binary("/path/to/querynode")
//!     .build();
//!
//! let mut fixture = Fixture::new(config)?;
//! fixture.start().await?;
//!
//! let client = TestServiceClient::new(fixture.query_conn().await?);
//! let reply = client.echo(&EchoRequest { message: "hello".into() }).await?;
//! assert_eq!(reply.message, "hello");
//! // node stopped and work dir removed when `fixture` drops
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod config;
pub mod connection;
pub mod error;
pub mod fixture;
pub mod runtime;

// Main interfaces
pub use config::{FixtureConfig, FixtureConfigBuilder};
pub use connection::{ConnectOptions, QueryConnection, Transport};
pub use error::{HarnessError, HarnessResult, Phase};
pub use fixture::{Fixture, FixtureState, NodeInfo};

// Supporting types
pub use clients::{NodeStatusClient, TestServiceClient};
pub use runtime::{CleanupReport, CleanupStack, NodeProcess, NodeStatus, ProcessController, SpawnSpec};
