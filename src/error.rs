//! Typed failures surfaced by the library.
//!
//! Psychrometric routines, the telemetry store port, and the command
//! functions each get their own enum so callers can match on exactly the
//! failures they are able to handle.

use thiserror::Error;

// ---

/// A psychrometric input outside the mathematically valid range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PsychroError {
    /// Input the formula cannot evaluate (e.g. non-positive humidity for a
    /// dew point, or a temperature at or below absolute zero).
    #[error("{function}: input out of domain ({detail})")]
    Domain {
        function: &'static str,
        detail: String,
    },
}

impl PsychroError {
    pub(crate) fn domain(function: &'static str, detail: impl Into<String>) -> Self {
        Self::Domain {
            function,
            detail: detail.into(),
        }
    }
}

/// Failures talking to the remote key/value tree.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or client-level failure (includes timeouts).
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered but refused the request.
    #[error("store rejected {path} with status {status}")]
    Rejected { path: String, status: u16 },

    /// The store answered with a body we could not decode.
    #[error("store returned undecodable data: {0}")]
    Decode(#[from] serde_json::Error),

    /// The in-process store refused the write.
    #[error("write to {0} refused")]
    Refused(String),
}

/// Failures surfaced by command functions.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The watchdog reports the device as disconnected; nothing was written.
    #[error("device is not connected")]
    NotConnected,

    /// The store rejected or timed out the write.
    #[error("write to {path} failed: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: StoreError,
    },

    /// A setpoint outside its valid range; nothing was written.
    #[error("{field} must be within [0, 100], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}
