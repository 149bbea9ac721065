//! Configuration for the detection engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::probes;

/// Upper bound on the per-probe timeout.
const MAX_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Configuration for jbdetect.
///
/// Every field has a default, so a host may pass a partial JSON object
/// (or `{}`) to [`DetectConfig::from_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Deadline for each probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Freshness window of the verdict cache, in milliseconds. 0 disables caching.
    pub cache_ttl_ms: u64,
    /// Paths checked in addition to the built-in jailbreak indicators.
    pub extra_paths: Vec<String>,
    /// File the sandbox probe tries to create outside the app container.
    pub sandbox_write_path: String,
    /// Executable the sandbox probe tries to spawn.
    pub spawn_path: String,
    /// Loaded-image keywords; empty means built-in list.
    pub dylib_keywords: Vec<String>,
    /// URL schemes registered by jailbreak tooling; empty means built-in list.
    pub url_schemes: Vec<String>,
    /// Injection env-var values that are known to be benign.
    pub env_whitelist: Vec<String>,
    /// App bundle directory; `None` means the running executable's directory on iOS.
    pub bundle_path: Option<String>,
    /// Entries that must exist at the top of the bundle; empty means built-in list.
    pub bundle_expected_entries: Vec<String>,
    /// Bundle entry-name prefixes that indicate tampering; empty means built-in list.
    pub bundle_forbidden_prefixes: Vec<String>,
    /// Hex SHA-256 the running executable must hash to. Unset skips the check.
    pub bundle_binary_sha256: Option<String>,
    /// Probe labels to leave out of the registry.
    pub disabled_probes: Vec<String>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 750,
            cache_ttl_ms: 5_000,
            extra_paths: Vec::new(),
            sandbox_write_path: "/private/jailbreak_probe.txt".into(),
            spawn_path: "/bin/ls".into(),
            dylib_keywords: Vec::new(),
            url_schemes: Vec::new(),
            // Xcode's view debugger injects this on iOS 18
            env_whitelist: vec!["/usr/lib/libViewDebuggerSupport.dylib".into()],
            bundle_path: None,
            bundle_expected_entries: Vec::new(),
            bundle_forbidden_prefixes: Vec::new(),
            bundle_binary_sha256: None,
            disabled_probes: Vec::new(),
        }
    }
}

impl DetectConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, DetectError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.probe_timeout_ms == 0 {
            return Err(DetectError::ConfigError {
                message: "probe_timeout_ms must be greater than zero".into(),
            });
        }
        if self.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(DetectError::ConfigError {
                message: format!(
                    "probe_timeout_ms {} exceeds maximum {}",
                    self.probe_timeout_ms, MAX_PROBE_TIMEOUT_MS
                ),
            });
        }
        if let Some(unknown) = self
            .disabled_probes
            .iter()
            .find(|label| !probes::ALL_LABELS.contains(&label.as_str()))
        {
            return Err(DetectError::ConfigError {
                message: format!("unknown probe label in disabled_probes: {unknown}"),
            });
        }
        if self.sandbox_write_path.is_empty() || self.spawn_path.is_empty() {
            return Err(DetectError::ConfigError {
                message: "sandbox_write_path and spawn_path must not be empty".into(),
            });
        }
        if let Some(digest) = &self.bundle_binary_sha256 {
            match hex::decode(digest) {
                Ok(bytes) if bytes.len() == 32 => {},
                _ => {
                    return Err(DetectError::ConfigError {
                        message: format!(
                            "bundle_binary_sha256 is not a SHA-256 hex digest: {digest}"
                        ),
                    });
                },
            }
        }
        Ok(())
    }

    /// Per-probe deadline.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Verdict cache freshness window.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Whether a probe label is enabled.
    pub fn is_enabled(&self, label: &str) -> bool {
        !self.disabled_probes.iter().any(|d| d == label)
    }
}
