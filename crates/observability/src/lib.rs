//! Process-wide tracing setup shared by the server and tools.

/// Initialize tracing with the format chosen by `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

pub mod tracing;

pub use crate::tracing::LogFormat;
