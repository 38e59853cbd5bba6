//! Runtime Management
//!
//! Process lifecycle, port reservation and cleanup registration for fixtures.

pub mod cleanup;
pub mod ports;
pub mod process;

pub use cleanup::{CleanupReport, CleanupStack};
pub use ports::{reserve_port, PortLease};
pub use process::{NodeProcess, NodeStatus, ProcessController, SpawnSpec};
