use std::time::Duration;

use thiserror::Error;

/// The I/O step that exceeded its time bound.
///
/// Only writes time out as errors: a connect that takes too long is a
/// [`Error::Connection`], and a quiet read ends the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IoStep {
    Write,
}

/// Top-level error type for the `acm200-api` crate.
///
/// Read timeouts never show up here: a quiet device is the normal way a
/// response ends, so the transport treats them as end-of-response.
/// `acm200-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Connect refused, DNS failure, or connect attempt timed out.
    #[error("Cannot connect to {address}: {reason}")]
    Connection { address: String, reason: String },

    /// A bounded I/O step (other than an idle read) took too long.
    #[error("{step} timed out after {after:?}")]
    Timeout { step: IoStep, after: Duration },

    /// Socket error after the connection was established.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Caller ──────────────────────────────────────────────────────
    /// Output/input id or address out of range.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The client was shut down; in-flight calls are abandoned.
    #[error("Device client shut down")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns `true` if the device could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_timeout_names_the_step() {
        let err = Error::Timeout {
            step: IoStep::Write,
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "write timed out after 2s");
        assert!(err.is_transient());
        assert!(!err.is_connection());
    }
}
