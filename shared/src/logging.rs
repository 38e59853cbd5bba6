//! Shared logging utilities for consistent tracing across the node and the harness

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info};

/// Which side of the query endpoint a process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Node,
    Harness,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Node => write!(f, "querynode"),
            ProcessRole::Harness => write!(f, "harness"),
        }
    }
}

impl ProcessRole {
    /// Filter directives for this role at the given base level
    pub fn filter_directives(&self, base_level: &str) -> String {
        match self {
            ProcessRole::Node => format!("querynode={base_level},shared={base_level}"),
            ProcessRole::Harness => format!("harness={base_level},shared={base_level}"),
        }
    }
}

/// Initialize the tracing subscriber for a long-running process.
///
/// Events go to stderr; the harness captures a node's stderr into its log file.
pub fn init_tracing(role: ProcessRole, log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::new(role.filter_directives(base_level));

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Initialize tracing for test binaries.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// `RUST_LOG` overrides the default harness filter.
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(ProcessRole::Harness.filter_directives("debug")));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .with_target(true)
        .compact()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Contextual logging helper for startup messages
pub fn log_startup(role: ProcessRole, details: &str) {
    info!(
        process = %role,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(role: ProcessRole, reason: &str) {
    info!(
        process = %role,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(role: ProcessRole, context: &str, error: &dyn fmt::Display) {
    error!(
        process = %role,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}
