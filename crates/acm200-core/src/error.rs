// ── Core error types ──
//
// User-facing errors from acm200-core. Consumers never see socket errors
// directly; the `From<acm200_api::Error>` impl translates transport-layer
// failures into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to matrix at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Matrix {step} timed out after {timeout_ms}ms")]
    Timeout { step: String, timeout_ms: u64 },

    #[error("Matrix I/O error: {message}")]
    Io { message: String },

    // ── Argument errors ──────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unknown source '{label}' for output {output:03}")]
    UnknownSource { output: u16, label: String },

    // ── Polling ──────────────────────────────────────────────────────
    /// A poll cycle was aborted; wraps the failure that stopped it.
    #[error("Routing update failed: {source}")]
    UpdateFailed { source: Box<CoreError> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Matrix client has been shut down")]
    Shutdown,
}

impl CoreError {
    /// Wrap a cycle failure for the poll scheduler.
    pub(crate) fn update_failed(source: CoreError) -> Self {
        match source {
            Self::Shutdown => Self::Shutdown,
            other => Self::UpdateFailed {
                source: Box::new(other),
            },
        }
    }

    /// The underlying cause, looking through `UpdateFailed`.
    pub fn root(&self) -> &CoreError {
        match self {
            Self::UpdateFailed { source } => source.root(),
            other => other,
        }
    }

    /// Returns `true` if the matrix could not be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self.root(), Self::ConnectionFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<acm200_api::Error> for CoreError {
    fn from(err: acm200_api::Error) -> Self {
        match err {
            acm200_api::Error::Connection { address, reason } => {
                CoreError::ConnectionFailed { address, reason }
            }
            acm200_api::Error::Timeout { step, after } => CoreError::Timeout {
                step: step.to_string(),
                timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            },
            acm200_api::Error::Io(e) => CoreError::Io {
                message: e.to_string(),
            },
            acm200_api::Error::InvalidArgument { message } => {
                CoreError::InvalidArgument { message }
            }
            acm200_api::Error::Cancelled => CoreError::Shutdown,
        }
    }
}
