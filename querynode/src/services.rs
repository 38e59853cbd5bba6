//! Built-in services served by the test node

use shared::status::{StatusRequest, StatusResponse, NODE_QUERY_SERVICE, STATUS_METHOD};
use shared::testdata::{
    EchoRequest, EchoResponse, SayHelloRequest, SayHelloResponse, ECHO_METHOD, SAY_HELLO_METHOD, TEST_SERVICE,
};
use shared::Status;

use crate::registry::ServiceRegistry;

/// Identity of the running node, reported by `node.Query/Status`
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub chain_id: String,
    pub moniker: String,
    pub home: String,
}

pub fn echo(request: EchoRequest) -> Result<EchoResponse, Status> {
    Ok(EchoResponse {
        message: request.message,
    })
}

pub fn say_hello(request: SayHelloRequest) -> Result<SayHelloResponse, Status> {
    Ok(SayHelloResponse {
        greeting: format!("Hello {}!", request.name),
    })
}

/// Registry with every built-in service registered
pub fn default_registry(context: NodeContext) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry
        .register(TEST_SERVICE, ECHO_METHOD, echo)
        .register(TEST_SERVICE, SAY_HELLO_METHOD, say_hello)
        .register(NODE_QUERY_SERVICE, STATUS_METHOD, move |_: StatusRequest| {
            Ok(StatusResponse {
                chain_id: context.chain_id.clone(),
                moniker: context.moniker.clone(),
                home: context.home.clone(),
            })
        });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{decode_payload, encode_payload, QueryOutcome, QueryRequest};

    fn context() -> NodeContext {
        NodeContext {
            chain_id: "test-chain".to_string(),
            moniker: "node0".to_string(),
            home: "/tmp/home".to_string(),
        }
    }

    #[test]
    fn test_echo_is_exact() {
        let response = echo(EchoRequest {
            message: "hello".to_string(),
        })
        .unwrap();
        assert_eq!(response.message, "hello");
    }

    #[test]
    fn test_say_hello_greeting() {
        let response = say_hello(SayHelloRequest {
            name: "Alice".to_string(),
        })
        .unwrap();
        assert_eq!(response.greeting, "Hello Alice!");
    }

    #[test]
    fn test_status_reports_context() {
        let registry = default_registry(context());
        let outcome = registry.dispatch(&QueryRequest {
            id: 3,
            service: NODE_QUERY_SERVICE.to_string(),
            method: STATUS_METHOD.to_string(),
            payload: encode_payload(&StatusRequest {}).unwrap(),
        });

        let payload = match outcome {
            QueryOutcome::Ok(payload) => payload,
            other => panic!("status failed: {other:?}"),
        };
        let status: StatusResponse = decode_payload(&payload).unwrap();
        assert_eq!(status.chain_id, "test-chain");
        assert_eq!(status.home, "/tmp/home");
    }

    #[test]
    fn test_default_registry_services() {
        let registry = default_registry(context());
        assert_eq!(registry.services(), vec![NODE_QUERY_SERVICE, TEST_SERVICE]);
        assert_eq!(registry.methods(TEST_SERVICE), vec![ECHO_METHOD, SAY_HELLO_METHOD]);
    }
}
