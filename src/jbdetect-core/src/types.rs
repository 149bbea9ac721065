//! Probe results and the aggregated verdict.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Tri-state outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Evidence of a jailbreak or tampering was found.
    Tampered,
    /// The check ran and found nothing.
    Clean,
    /// The check could not determine anything (denied, unsupported, timed out).
    Inconclusive,
}

impl ProbeStatus {
    /// Whether the probe reached a definite answer.
    #[must_use]
    pub fn is_conclusive(self) -> bool {
        !matches!(self, Self::Inconclusive)
    }
}

/// Result produced by one probe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Outcome.
    pub status: ProbeStatus,
    /// Label of the probe that produced this result.
    pub label: String,
    /// Free-form diagnostic detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Wall time spent in the probe, in microseconds.
    #[serde(default)]
    pub elapsed_us: u64,
}

impl ProbeResult {
    /// Build a result with no detail.
    pub fn new(label: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            status,
            label: label.into(),
            detail: None,
            elapsed_us: 0,
        }
    }

    /// A tampered result with detail.
    pub fn tampered(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(label, ProbeStatus::Tampered).with_detail(detail)
    }

    /// A clean result.
    pub fn clean(label: impl Into<String>) -> Self {
        Self::new(label, ProbeStatus::Clean)
    }

    /// An inconclusive result with detail.
    pub fn inconclusive(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(label, ProbeStatus::Inconclusive).with_detail(detail)
    }

    /// Fold a probe error into an inconclusive result.
    pub fn inconclusive_from(label: impl Into<String>, error: &ProbeError) -> Self {
        Self::inconclusive(label, error.to_string())
    }

    /// Attach a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Record how long the probe took.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// Whether this result signals tampering.
    #[must_use]
    pub fn is_tampered(&self) -> bool {
        self.status == ProbeStatus::Tampered
    }
}

/// The aggregated trust decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// True iff at least one probe reported `Tampered`.
    pub is_tampered: bool,
    /// The `Tampered` results, in registry order.
    pub fired: Vec<ProbeResult>,
    /// Unix timestamp (seconds) of the computation.
    pub computed_at: i64,
    /// Number of probes that ran.
    pub probes_run: usize,
    /// Number of probes that came back `Inconclusive`.
    pub inconclusive: usize,
    /// Confidence in `is_tampered`, in `[0, 1]`.
    pub confidence: f64,
}

impl Verdict {
    /// Labels of the probes that fired.
    pub fn fired_labels(&self) -> Vec<&str> {
        self.fired.iter().map(|r| r.label.as_str()).collect()
    }

    /// Serialize for host-side logging.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Get current Unix timestamp.
pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
