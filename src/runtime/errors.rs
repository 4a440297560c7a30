//! Error types for the decode runtime

/// Error type for decode operations
///
/// Protocol anomalies (start, parity and framing errors) are not errors: they are
/// reported as events in the decoded stream. Cancellation is not an error either.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("No start point found: no /CS falling edge and no trigger position")]
    NoStartPoint,

    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture lock poisoned by a panicked writer")]
    LockPoisoned,

    #[error("Decode worker '{0}' panicked")]
    WorkerPanicked(String),
}

/// Result type for decode functions
pub type DecodeResult<T = ()> = Result<T, DecodeError>;
