//! Loader injection through environment variables.
//!
//! `DYLD_INSERT_LIBRARIES` (Apple) and `LD_PRELOAD` (Linux/Android) make the
//! dynamic loader map extra libraries before the app's own code runs. On a
//! stock device neither is ever set for an App Store process.

use tracing::debug;

use crate::config::DetectConfig;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "environment";

#[cfg(any(target_os = "macos", target_os = "ios"))]
const INJECTION_VARS: &[&str] = &["DYLD_INSERT_LIBRARIES"];

#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
const INJECTION_VARS: &[&str] = &["LD_PRELOAD"];

#[cfg(not(unix))]
const INJECTION_VARS: &[&str] = &[];

/// Flags loader-injection variables with non-whitelisted values.
#[derive(Debug, Clone)]
pub struct EnvironmentProbe {
    vars: Vec<String>,
    whitelist: Vec<String>,
}

impl EnvironmentProbe {
    /// Probe over explicit variable names and benign values.
    pub fn new(vars: Vec<String>, whitelist: Vec<String>) -> Self {
        Self { vars, whitelist }
    }

    /// Platform injection variables with `config.env_whitelist`.
    pub fn from_config(config: &DetectConfig) -> Self {
        Self::new(
            INJECTION_VARS.iter().map(|v| (*v).to_string()).collect(),
            config.env_whitelist.clone(),
        )
    }

    /// Evaluate against an arbitrary variable lookup.
    pub fn evaluate<F>(&self, lookup: F) -> ProbeResult
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.vars.is_empty() {
            return ProbeResult::inconclusive(
                LABEL,
                "no loader injection variables on this platform",
            );
        }

        for var in &self.vars {
            let Some(value) = lookup(var).filter(|v| !v.is_empty()) else {
                continue;
            };
            if self.whitelist.iter().any(|w| *w == value) {
                debug!(var = %var, value = %value, "Environment: whitelisted injected library");
                continue;
            }
            return ProbeResult::tampered(LABEL, format!("{var}={value}"));
        }
        ProbeResult::clean(LABEL)
    }
}

impl Probe for EnvironmentProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        self.evaluate(|name| std::env::var_os(name).map(|v| v.to_string_lossy().into_owned()))
    }

    fn weight(&self) -> Weight {
        Weight::Strong
    }
}
