//! The probe contract and the ordered probe registry.

use std::fmt;
use std::sync::Arc;

use crate::config::DetectConfig;
use crate::probes;
use crate::types::ProbeResult;

/// How much a `Tampered` result from a probe should be trusted.
///
/// Weights feed the verdict's confidence only; they never change the
/// any-positive boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    /// Narrow, high-confidence signal (jailbreak-only artifacts).
    Strong,
    /// Usually a jailbreak, occasionally a developer setup.
    Moderate,
    /// Correlated with tampering but common for legitimate reasons (debuggers).
    Weak,
}

impl Weight {
    /// Probability-like contribution to confidence.
    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Self::Strong => 0.95,
            Self::Moderate => 0.7,
            Self::Weak => 0.3,
        }
    }
}

/// A single independent environmental check.
///
/// Implementations must not panic on expected failures and must return
/// `Inconclusive` for anything they cannot decide. They hold no state
/// between runs.
pub trait Probe: Send + Sync {
    /// Stable identifier used in diagnostics and configuration.
    fn label(&self) -> &'static str;

    /// Inspect the environment.
    fn run(&self) -> ProbeResult;

    /// Confidence weight of a positive result.
    fn weight(&self) -> Weight {
        Weight::Strong
    }

    /// Whether `run` creates side effects it must clean up itself.
    ///
    /// The aggregator always waits for such probes, even past their deadline,
    /// so that cleanup is finished before a verdict is published.
    fn has_scoped_side_effect(&self) -> bool {
        false
    }

    /// Whether `run` must execute on the thread that asked for the verdict.
    ///
    /// Set by probes that call host APIs bound to the caller's thread (UI
    /// frameworks on the main thread). Inline probes cannot be preempted, so
    /// they delay the verdict by however long they take; a result that
    /// arrives after the deadline still counts as `Inconclusive`.
    fn runs_inline(&self) -> bool {
        false
    }
}

/// Ordered collection of probes.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in probe set, minus any disabled in `config`.
    pub fn standard(config: &DetectConfig) -> Self {
        let mut registry = Self::new();
        for probe in probes::standard_probes(config) {
            if config.is_enabled(probe.label()) {
                registry.probes.push(probe);
            }
        }
        registry
    }

    /// Append a probe.
    pub fn register(&mut self, probe: Arc<dyn Probe>) -> &mut Self {
        self.probes.push(probe);
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, probe: impl Probe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Registered probes in order.
    pub fn probes(&self) -> &[Arc<dyn Probe>] {
        &self.probes
    }

    /// Labels in registry order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.label()).collect()
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probes are registered.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("probes", &self.labels())
            .finish()
    }
}
