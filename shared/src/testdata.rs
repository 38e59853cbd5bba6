//! Messages of the `testdata.TestService` service used by end-to-end tests

use serde::{Deserialize, Serialize};

pub const TEST_SERVICE: &str = "testdata.TestService";
pub const ECHO_METHOD: &str = "Echo";
pub const SAY_HELLO_METHOD: &str = "SayHello";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EchoRequest {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EchoResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SayHelloRequest {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SayHelloResponse {
    pub greeting: String,
}
