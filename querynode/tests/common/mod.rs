//! Common test utilities for end-to-end tests against the querynode binary

#![allow(dead_code)]

use harness::{Fixture, FixtureConfig, FixtureConfigBuilder};
use std::time::Duration;

/// Builder pointing at the querynode binary built for this test run
pub fn node_config() -> FixtureConfigBuilder {
    shared::logging::init_test_tracing();
    FixtureConfig::builder()
        .binary(env!("CARGO_BIN_EXE_querynode"))
        .log_level("debug")
        .ready_timeout(Duration::from_secs(10))
        .call_timeout(Duration::from_secs(5))
        .grace_period(Duration::from_secs(2))
}

/// A started fixture; panics with the setup error otherwise
pub async fn started_fixture(config: FixtureConfig) -> Fixture {
    let mut fixture = Fixture::new(config).expect("fixture allocation");
    if let Err(e) = fixture.start().await {
        panic!("❌ fixture setup failed: {e}");
    }
    fixture
}

#[cfg(unix)]
pub fn pid_is_gone(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None) == Err(Errno::ESRCH)
}
