//! Message protocol engine: decoding, dispatch and log redaction.

pub mod engine;
pub mod params;
pub mod redact;

pub use engine::handle_frame;
pub use redact::redact_for_log;
