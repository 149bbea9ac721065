//! Probes with a predetermined outcome.

use std::thread;
use std::time::Duration;

use jbdetect_core::{Probe, ProbeResult, ProbeStatus};

/// Labels available to forced probes.
pub const LABELS: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel",
];

/// A probe that reports `status` after an optional delay.
#[derive(Debug, Clone)]
pub struct ForcedProbe {
    pub label: &'static str,
    pub status: ProbeStatus,
    pub delay: Option<Duration>,
}

impl ForcedProbe {
    pub fn new(label: &'static str, status: ProbeStatus) -> Self {
        Self {
            label,
            status,
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Probe for ForcedProbe {
    fn label(&self) -> &'static str {
        self.label
    }

    fn run(&self) -> ProbeResult {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        ProbeResult::new(self.label, self.status)
    }
}
