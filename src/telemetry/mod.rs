//! Telemetry
//!
//! - **Logging**: `tracing` subscriber setup
//! - **Redaction**: credential masking for request/response debug logs

pub mod logging;
pub mod redact;

pub use logging::init_tracing;
pub use redact::{redact_body, redact_headers, redact_json};
