//! Fixture Configuration Builder
//!
//! Provides a flexible builder pattern for constructing fixture configurations

use std::path::PathBuf;
use std::time::Duration;

use super::FixtureConfig;

pub struct FixtureConfigBuilder {
    config: FixtureConfig,
}

impl FixtureConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FixtureConfig::default(),
        }
    }

    /// Start from an existing configuration, such as one read from the environment
    pub fn from_config(config: FixtureConfig) -> Self {
        Self { config }
    }

    /// Set the node binary
    pub fn binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.config.binary = binary.into();
        self
    }

    pub fn chain_id<S: Into<String>>(mut self, chain_id: S) -> Self {
        self.config.chain_id = chain_id.into();
        self
    }

    pub fn moniker<S: Into<String>>(mut self, moniker: S) -> Self {
        self.config.moniker = moniker.into();
        self
    }

    /// Set log level (trace, debug, info, warn, error)
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Set maximum time to wait for the query endpoint
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.ready_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set per-call timeout
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set time between SIGTERM and SIGKILL
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config.grace_period = grace;
        self
    }

    pub fn kill_timeout(mut self, timeout: Duration) -> Self {
        self.config.kill_timeout = timeout;
        self
    }

    /// Skip `init`; the node starts on an empty home
    pub fn skip_init(mut self) -> Self {
        self.config.init_home = false;
        self
    }

    /// Append one argument to the `start` command line
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Set an environment variable for the node process
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    /// Build the configuration
    pub fn build(self) -> FixtureConfig {
        self.config
    }
}

impl Default for FixtureConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
