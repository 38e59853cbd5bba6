//! Common test utilities for harness integration tests

#![allow(dead_code)]

use harness::FixtureConfig;
use std::time::Duration;

/// Config with short timeouts so failing setups finish quickly
pub fn fast_config(binary: &str) -> FixtureConfig {
    shared::logging::init_test_tracing();
    FixtureConfig::builder()
        .binary(binary)
        .ready_timeout(Duration::from_secs(2))
        .grace_period(Duration::from_millis(500))
        .kill_timeout(Duration::from_millis(500))
        .build()
}
