//! Public entry points.
//!
//! Three names for one question, kept for compatibility with the calling
//! code that expects each of them. All three consult the process-wide
//! engine and return the same answer for the same cached verdict.

use crate::engine;

/// Whether the device appears jailbroken.
pub fn is_jailbroken() -> bool {
    engine::shared().is_tampered()
}

/// Alias of [`is_jailbroken`].
pub fn is_jailbreak() -> bool {
    is_jailbroken()
}

/// Class-style surface for object-oriented callers.
///
/// Carries no state; every call goes to the process-wide engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct JbDetector;

impl JbDetector {
    /// Same answer as [`is_jailbroken`].
    pub fn is_jailbreak_flag_check() -> bool {
        is_jailbroken()
    }
}
