//! Fixture Configuration
//!
//! Everything a fixture needs to launch and talk to one node.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::connection::ConnectOptions;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::ProcessController;

pub const ENV_NODE_BIN: &str = "HARNESS_NODE_BIN";
pub const ENV_READY_TIMEOUT_MS: &str = "HARNESS_READY_TIMEOUT_MS";
pub const ENV_CALL_TIMEOUT_MS: &str = "HARNESS_CALL_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "HARNESS_LOG_LEVEL";
pub const ENV_CHAIN_ID: &str = "HARNESS_CHAIN_ID";

#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Node binary; a bare name is resolved through PATH
    pub binary: PathBuf,
    pub chain_id: String,
    pub moniker: String,
    pub log_level: String,
    /// Upper bound on the wait for the query endpoint
    pub ready_timeout: Duration,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    /// Time between SIGTERM and SIGKILL on stop
    pub grace_period: Duration,
    pub kill_timeout: Duration,
    /// Run `init` on the home dir before `start`
    pub init_home: bool,
    /// Appended to the `start` command line
    pub extra_args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("querynode"),
            chain_id: "querynode-test".to_string(),
            moniker: "node0".to_string(),
            log_level: "info".to_string(),
            ready_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(2),
            init_home: true,
            extra_args: Vec::new(),
            env: Vec::new(),
        }
    }
}

impl FixtureConfig {
    /// Create a new builder
    pub fn builder() -> super::FixtureConfigBuilder {
        super::FixtureConfigBuilder::new()
    }

    /// Defaults overridden by `HARNESS_*` variables, reading `.env` first
    pub fn from_env() -> HarnessResult<Self> {
        let _ = dotenv::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `HARNESS_*` keys
    pub fn from_vars<F>(lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(binary) = lookup(ENV_NODE_BIN) {
            config.binary = PathBuf::from(binary);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(chain_id) = lookup(ENV_CHAIN_ID) {
            config.chain_id = chain_id;
        }
        if let Some(ms) = lookup(ENV_READY_TIMEOUT_MS) {
            config.ready_timeout = parse_millis(ENV_READY_TIMEOUT_MS, &ms)?;
        }
        if let Some(ms) = lookup(ENV_CALL_TIMEOUT_MS) {
            config.call_timeout = parse_millis(ENV_CALL_TIMEOUT_MS, &ms)?;
        }

        debug!("🔧 Fixture config from environment: {:?}", config);
        Ok(config)
    }

    /// Command line of the home initialization run
    pub fn init_args(&self, home: &Path) -> Vec<String> {
        vec![
            "init".to_string(),
            "--home".to_string(),
            home.display().to_string(),
            "--chain-id".to_string(),
            self.chain_id.clone(),
            "--moniker".to_string(),
            self.moniker.clone(),
            "--log-level".to_string(),
            self.log_level.clone(),
        ]
    }

    /// Command line of the long-running node
    pub fn start_args(&self, home: &Path, query_addr: SocketAddr) -> Vec<String> {
        let mut args = vec![
            "start".to_string(),
            "--home".to_string(),
            home.display().to_string(),
            "--query-addr".to_string(),
            query_addr.to_string(),
            "--log-level".to_string(),
            self.log_level.clone(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Check if this configuration is usable
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.binary.as_os_str().is_empty() {
            return Err(HarnessError::config("node binary must be set"));
        }
        if self.chain_id.trim().is_empty() {
            return Err(HarnessError::config("chain id must not be empty"));
        }
        if self.ready_timeout.is_zero() {
            return Err(HarnessError::config("ready timeout must be positive"));
        }
        if self.call_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(HarnessError::config("connect and call timeouts must be positive"));
        }
        Ok(())
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: self.connect_timeout,
            call_timeout: self.call_timeout,
        }
    }

    /// Process controller using this config's stop timeouts
    pub fn controller(&self) -> ProcessController {
        ProcessController::new()
            .with_grace_period(self.grace_period)
            .with_kill_timeout(self.kill_timeout)
    }
}

fn parse_millis(key: &str, value: &str) -> HarnessResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| HarnessError::config(format!("{key} must be milliseconds, got '{value}'")))
}
