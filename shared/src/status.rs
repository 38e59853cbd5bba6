//! Messages of the `node.Query` service

use serde::{Deserialize, Serialize};

pub const NODE_QUERY_SERVICE: &str = "node.Query";
pub const STATUS_METHOD: &str = "Status";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusRequest {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StatusResponse {
    pub chain_id: String,
    pub moniker: String,
    pub home: String,
}
