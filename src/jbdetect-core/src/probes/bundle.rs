//! App bundle integrity.
//!
//! Re-signing tools and sideloaders leave their marks in the top level of
//! the `.app` directory: stripped signature folders, injected dylibs,
//! signer watermark files. The probe lists the bundle once and checks
//!
//! - every expected entry is present,
//! - no entry starts with a forbidden prefix (case-insensitive),
//! - optionally, the executable hashes to a pinned SHA-256.
//!
//! Hosts without an app bundle report `Inconclusive`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::DetectConfig;
use crate::error::ProbeError;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "bundle";

#[cfg(target_os = "ios")]
const BUILTIN_EXPECTED: &[&str] = &["Info.plist", "PkgInfo", "_CodeSignature"];

#[cfg(not(target_os = "ios"))]
const BUILTIN_EXPECTED: &[&str] = &[];

/// Entry-name prefixes left by tweak injection and third-party signers.
const BUILTIN_FORBIDDEN: &[&str] = &[
    "lib",
    "tweak",
    "substrate",
    "NATHANLR",
    "dylib",
    "使用全能签签名",
    "SignedByEsign",
];

/// Checks the top level of the app bundle and, optionally, the executable hash.
#[derive(Debug, Clone)]
pub struct BundleProbe {
    bundle: Option<PathBuf>,
    expected: Vec<String>,
    forbidden: Vec<String>,
    pinned_binary: Option<(PathBuf, Vec<u8>)>,
}

impl BundleProbe {
    /// Probe over an explicit bundle directory with no checks configured.
    pub fn new(bundle: impl Into<PathBuf>) -> Self {
        Self {
            bundle: Some(bundle.into()),
            expected: Vec::new(),
            forbidden: Vec::new(),
            pinned_binary: None,
        }
    }

    /// Entries that must exist at the top of the bundle.
    #[must_use]
    pub fn with_expected<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Entry-name prefixes that must not appear (matched case-insensitively).
    #[must_use]
    pub fn with_forbidden_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden = prefixes
            .into_iter()
            .map(|p| p.into().to_lowercase())
            .collect();
        self
    }

    /// Require `binary` to hash to `sha256`.
    #[must_use]
    pub fn with_pinned_binary(mut self, binary: impl Into<PathBuf>, sha256: Vec<u8>) -> Self {
        self.pinned_binary = Some((binary.into(), sha256));
        self
    }

    /// Bundle located from configuration, falling back to the running
    /// executable's directory on iOS.
    pub fn from_config(config: &DetectConfig) -> Self {
        let bundle = config
            .bundle_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(default_bundle_dir);

        let expected: Vec<String> = if config.bundle_expected_entries.is_empty() {
            BUILTIN_EXPECTED.iter().map(|e| (*e).to_string()).collect()
        } else {
            config.bundle_expected_entries.clone()
        };
        let forbidden: Vec<String> = if config.bundle_forbidden_prefixes.is_empty() {
            BUILTIN_FORBIDDEN.iter().map(|p| (*p).to_string()).collect()
        } else {
            config.bundle_forbidden_prefixes.clone()
        };

        let mut probe = Self {
            bundle,
            expected: Vec::new(),
            forbidden: Vec::new(),
            pinned_binary: None,
        }
        .with_expected(expected)
        .with_forbidden_prefixes(forbidden);

        // Validation has already checked the digest shape
        let digest = config
            .bundle_binary_sha256
            .as_deref()
            .and_then(|h| hex::decode(h).ok());
        if let (Some(digest), Ok(exe)) = (digest, std::env::current_exe()) {
            probe = probe.with_pinned_binary(exe, digest);
        }
        probe
    }

    /// Bundle directory this probe inspects, if any.
    pub fn bundle(&self) -> Option<&Path> {
        self.bundle.as_deref()
    }

    fn first_forbidden<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        names
            .iter()
            .find(|name| {
                let lower = name.to_lowercase();
                self.forbidden.iter().any(|p| lower.starts_with(p.as_str()))
            })
            .map(String::as_str)
    }

    fn first_missing(&self, names: &[String]) -> Option<&str> {
        let present: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        self.expected
            .iter()
            .find(|e| !present.contains(&e.to_lowercase()))
            .map(String::as_str)
    }
}

#[cfg(target_os = "ios")]
fn default_bundle_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

#[cfg(not(target_os = "ios"))]
fn default_bundle_dir() -> Option<PathBuf> {
    None
}

fn list_entries(dir: &Path) -> Result<Vec<String>, ProbeError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Compute SHA-256 of a file.
fn hash_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hasher.finalize().to_vec())
}

impl Probe for BundleProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        let Some(bundle) = &self.bundle else {
            return ProbeResult::inconclusive_from(
                LABEL,
                &ProbeError::Unsupported {
                    platform: ProbeError::current_platform(),
                },
            );
        };

        let names = match list_entries(bundle) {
            Ok(names) => names,
            Err(e) => return ProbeResult::inconclusive_from(LABEL, &e),
        };
        debug!(bundle = %bundle.display(), entries = names.len(), "Bundle: listed");

        if let Some(name) = self.first_forbidden(&names) {
            return ProbeResult::tampered(LABEL, format!("unexpected bundle entry {name}"));
        }
        if let Some(name) = self.first_missing(&names) {
            return ProbeResult::tampered(LABEL, format!("missing bundle entry {name}"));
        }

        if let Some((binary, pinned)) = &self.pinned_binary {
            match hash_file(binary) {
                Ok(actual) if actual == *pinned => {},
                Ok(actual) => {
                    debug!(actual = %hex::encode(&actual), "Bundle: executable hash mismatch");
                    return ProbeResult::tampered(LABEL, "executable hash mismatch");
                },
                Err(e) => return ProbeResult::inconclusive_from(LABEL, &ProbeError::Io(e)),
            }
        }

        ProbeResult::clean(LABEL)
    }

    fn weight(&self) -> Weight {
        Weight::Moderate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeStatus;

    fn stock_bundle() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Info.plist"), b"").unwrap();
        std::fs::write(dir.path().join("PkgInfo"), b"APPL????").unwrap();
        std::fs::create_dir(dir.path().join("_CodeSignature")).unwrap();
        std::fs::write(dir.path().join("App"), b"\xcf\xfa\xed\xfe").unwrap();
        dir
    }

    fn checks(check: BundleProbe) -> BundleProbe {
        check
            .with_expected(["Info.plist", "PkgInfo", "_CodeSignature"])
            .with_forbidden_prefixes(BUILTIN_FORBIDDEN.iter().copied())
    }

    #[test]
    fn test_stock_bundle_is_clean() {
        let dir = stock_bundle();
        assert_eq!(checks(BundleProbe::new(dir.path())).run().status, ProbeStatus::Clean);
    }

    #[test]
    fn test_injected_dylib_is_tampered() {
        let dir = stock_bundle();
        std::fs::write(dir.path().join("LibTweakLoader.dylib"), b"").unwrap();

        let result = checks(BundleProbe::new(dir.path())).run();
        assert_eq!(result.status, ProbeStatus::Tampered);
        assert_eq!(
            result.detail.as_deref(),
            Some("unexpected bundle entry LibTweakLoader.dylib")
        );
    }

    #[test]
    fn test_signer_watermark_is_tampered() {
        let dir = stock_bundle();
        std::fs::write(dir.path().join("signedbyesign.txt"), b"").unwrap();
        assert_eq!(
            checks(BundleProbe::new(dir.path())).run().status,
            ProbeStatus::Tampered
        );
    }

    #[test]
    fn test_stripped_signature_is_tampered() {
        let dir = stock_bundle();
        std::fs::remove_dir(dir.path().join("_CodeSignature")).unwrap();

        let result = checks(BundleProbe::new(dir.path())).run();
        assert_eq!(result.status, ProbeStatus::Tampered);
        assert_eq!(result.detail.as_deref(), Some("missing bundle entry _CodeSignature"));
    }

    #[test]
    fn test_missing_bundle_is_inconclusive() {
        let check = checks(BundleProbe::new("/nonexistent/jbdetect/App.app"));
        assert_eq!(check.run().status, ProbeStatus::Inconclusive);
    }

    #[test]
    fn test_pinned_binary_match_and_mismatch() {
        let dir = stock_bundle();
        let binary = dir.path().join("App");
        let digest = hash_file(&binary).unwrap();
        assert_eq!(digest.len(), 32);

        let matching = checks(BundleProbe::new(dir.path())).with_pinned_binary(&binary, digest);
        assert_eq!(matching.run().status, ProbeStatus::Clean);

        let pinned = checks(BundleProbe::new(dir.path())).with_pinned_binary(&binary, vec![0; 32]);
        let result = pinned.run();
        assert_eq!(result.status, ProbeStatus::Tampered);
        assert_eq!(result.detail.as_deref(), Some("executable hash mismatch"));
    }

    #[test]
    fn test_from_config_uses_configured_bundle() {
        let dir = stock_bundle();
        let config = DetectConfig {
            bundle_path: Some(dir.path().display().to_string()),
            ..DetectConfig::default()
        };
        let check = BundleProbe::from_config(&config);
        assert_eq!(check.bundle(), Some(dir.path()));
        assert!(check.pinned_binary.is_none());
    }

    #[test]
    fn test_no_bundle_is_inconclusive() {
        let check = BundleProbe {
            bundle: None,
            expected: Vec::new(),
            forbidden: Vec::new(),
            pinned_binary: None,
        };
        assert_eq!(check.run().status, ProbeStatus::Inconclusive);
    }
}
