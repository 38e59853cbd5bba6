//! Service registry routing `(service, method)` pairs to handlers

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use shared::{decode_payload, encode_payload, QueryOutcome, QueryRequest, Status};

/// Raw handler over encoded payloads
pub type Handler = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, Status> + Send + Sync>;

#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, HashMap<String, Handler>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler; payloads are decoded and encoded with the wire codec
    pub fn register<Req, Resp, F>(&mut self, service: &str, method: &str, handler: F) -> &mut Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        F: Fn(Req) -> Result<Resp, Status> + Send + Sync + 'static,
    {
        let route = format!("{service}/{method}");
        let raw: Handler = Arc::new(move |payload: &[u8]| {
            let request: Req = decode_payload(payload)
                .map_err(|e| Status::invalid_argument(format!("malformed {route} request: {e}")))?;
            let response = handler(request)?;
            encode_payload(&response).map_err(|e| Status::internal(format!("failed to encode {route} response: {e}")))
        });

        self.services
            .entry(service.to_string())
            .or_default()
            .insert(method.to_string(), raw);
        self
    }

    /// Route a request to its handler
    pub fn dispatch(&self, request: &QueryRequest) -> QueryOutcome {
        let Some(methods) = self.services.get(&request.service) else {
            return QueryOutcome::Err(Status::not_found(format!("unknown service {}", request.service)));
        };
        let Some(handler) = methods.get(&request.method) else {
            return QueryOutcome::Err(Status::unimplemented(format!(
                "unknown method {} on service {}",
                request.method, request.service
            )));
        };

        match handler(&request.payload) {
            Ok(payload) => QueryOutcome::Ok(payload),
            Err(status) => QueryOutcome::Err(status),
        }
    }

    /// Registered service names, sorted
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn methods(&self, service: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .get(service)
            .map(|methods| methods.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StatusCode;

    fn request(service: &str, method: &str, payload: Vec<u8>) -> QueryRequest {
        QueryRequest {
            id: 1,
            service: service.to_string(),
            method: method.to_string(),
            payload,
        }
    }

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.register("math.Calc", "Double", |n: u64| Ok(n * 2));
        registry.register("math.Calc", "Fail", |_: u64| -> Result<u64, Status> {
            Err(Status::internal("boom"))
        });
        registry
    }

    #[test]
    fn test_dispatch_typed_handler() {
        let outcome = registry().dispatch(&request("math.Calc", "Double", encode_payload(&21u64).unwrap()));

        let payload = match outcome {
            QueryOutcome::Ok(payload) => payload,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(decode_payload::<u64>(&payload).unwrap(), 42);
    }

    #[test]
    fn test_unknown_service_is_not_found() {
        let outcome = registry().dispatch(&request("math.Missing", "Double", vec![]));
        assert!(matches!(outcome, QueryOutcome::Err(Status { code: StatusCode::NotFound, .. })));
    }

    #[test]
    fn test_unknown_method_is_unimplemented() {
        let outcome = registry().dispatch(&request("math.Calc", "Triple", vec![]));
        assert!(matches!(outcome, QueryOutcome::Err(Status { code: StatusCode::Unimplemented, .. })));
    }

    #[test]
    fn test_malformed_payload_is_invalid_argument() {
        let outcome = registry().dispatch(&request("math.Calc", "Double", vec![1]));
        assert!(matches!(outcome, QueryOutcome::Err(Status { code: StatusCode::InvalidArgument, .. })));
    }

    #[test]
    fn test_handler_status_passes_through() {
        let outcome = registry().dispatch(&request("math.Calc", "Fail", encode_payload(&1u64).unwrap()));
        assert_eq!(outcome, QueryOutcome::Err(Status::internal("boom")));
    }

    #[test]
    fn test_listing() {
        let registry = registry();
        assert_eq!(registry.services(), vec!["math.Calc"]);
        assert_eq!(registry.methods("math.Calc"), vec!["Double", "Fail"]);
        assert!(registry.methods("nope").is_empty());
    }
}
