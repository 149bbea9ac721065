//! Error types for detection operations.
//!
//! Neither type ever reaches the public facade: probe errors are folded
//! into `Inconclusive` results, and configuration errors are reported to
//! the host at configuration time only.

use thiserror::Error;

/// Errors raised by the engine outside of probe execution.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Configuration rejected by validation.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message.
        message: String,
    },

    /// Configuration or report (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised inside a single probe.
///
/// A failed check is evidence of nothing, so every variant maps to an
/// `Inconclusive` result via [`crate::types::ProbeResult::inconclusive_from`].
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Filesystem or process I/O failed for a reason other than denial.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The signal cannot be observed on this platform.
    #[error("Unsupported on {platform}")]
    Unsupported {
        /// Target OS name.
        platform: &'static str,
    },

    /// The probe did not finish within its deadline.
    #[error("Timed out after {elapsed_ms} ms")]
    Timeout {
        /// Time waited before giving up.
        elapsed_ms: u64,
    },

    /// The probe panicked; the panic was contained.
    #[error("Probe panicked")]
    Panicked,

    /// A host-provided collaborator is not installed.
    #[error("No {what} installed")]
    MissingHost {
        /// Name of the missing collaborator.
        what: &'static str,
    },

    /// A platform API returned an unusable answer.
    #[error("Platform query failed: {reason}")]
    Query {
        /// What went wrong.
        reason: String,
    },
}

impl ProbeError {
    /// Name of the running target OS, for `Unsupported` errors.
    pub fn current_platform() -> &'static str {
        std::env::consts::OS
    }
}
