//! Configuration Management
//!
//! Fixture configuration and its fluent builder.

pub mod builder;
pub mod fixture;

pub use builder::FixtureConfigBuilder;
pub use fixture::FixtureConfig;
