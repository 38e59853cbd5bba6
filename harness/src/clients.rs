//! Typed clients over a shared [`QueryConnection`]

use shared::status::{StatusRequest, StatusResponse, NODE_QUERY_SERVICE, STATUS_METHOD};
use shared::testdata::{
    EchoRequest, EchoResponse, SayHelloRequest, SayHelloResponse, ECHO_METHOD, SAY_HELLO_METHOD, TEST_SERVICE,
};

use crate::connection::QueryConnection;
use crate::error::HarnessResult;

/// Client of `testdata.TestService`
#[derive(Debug, Clone)]
pub struct TestServiceClient {
    conn: QueryConnection,
}

impl TestServiceClient {
    pub fn new(conn: QueryConnection) -> Self {
        Self { conn }
    }

    pub async fn echo(&self, request: &EchoRequest) -> HarnessResult<EchoResponse> {
        self.conn.invoke_typed(TEST_SERVICE, ECHO_METHOD, request).await
    }

    pub async fn say_hello(&self, request: &SayHelloRequest) -> HarnessResult<SayHelloResponse> {
        self.conn.invoke_typed(TEST_SERVICE, SAY_HELLO_METHOD, request).await
    }
}

/// Client of `node.Query`
#[derive(Debug, Clone)]
pub struct NodeStatusClient {
    conn: QueryConnection,
}

impl NodeStatusClient {
    pub fn new(conn: QueryConnection) -> Self {
        Self { conn }
    }

    pub async fn status(&self) -> HarnessResult<StatusResponse> {
        self.conn
            .invoke_typed(NODE_QUERY_SERVICE, STATUS_METHOD, &StatusRequest::default())
            .await
    }
}
