//! Fatal error taxonomy. Only configuration/decode/allocation failures
//! surface as `Result` — capacity overflow is a contract assertion
//! (`debug_assert!` in `engine::arena`), and display/input failures are
//! logged and swallowed where they occur instead of propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("staticSize must be a power of two, got {0}")]
    InvalidStaticSize(u32),

    #[error("thread count must be nonzero")]
    ZeroThreads,

    #[error("pattern decode failed at byte {offset}: {reason}")]
    PatternDecode { offset: usize, reason: String },

    #[error("allocation failed: {0}")]
    Alloc(String),
}
