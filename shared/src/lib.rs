//! Shared types for the node test harness
//!
//! Contains what both sides of the query endpoint must agree on: the frame
//! format, the service message types and the logging setup used by every
//! process.

pub mod errors;
pub mod logging;
pub mod protocol;
pub mod status;
pub mod testdata;

pub use errors::*;
pub use logging::ProcessRole;
pub use protocol::{
    decode_payload, encode_frame, encode_payload, read_frame, write_frame, QueryOutcome, QueryRequest, QueryResponse, Status,
    StatusCode, MAX_FRAME_LEN,
};
