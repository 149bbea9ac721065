//! Relocated system directories.
//!
//! Older jailbreaks moved `/Applications` and friends to the data
//! partition and left symlinks behind to free space on the system volume.

use std::path::Path;

use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "symlink";

#[cfg(target_os = "ios")]
const SYSTEM_DIRS: &[&str] = &[
    "/Applications",
    "/Library/Ringtones",
    "/Library/Wallpaper",
    "/usr/arm-apple-darwin9",
    "/usr/include",
    "/usr/libexec",
    "/usr/share",
];

// Merged-/usr distributions symlink system directories on purpose
#[cfg(not(target_os = "ios"))]
const SYSTEM_DIRS: &[&str] = &[];

/// Flags system directories that have been replaced by symlinks.
#[derive(Debug, Clone)]
pub struct SymlinkProbe {
    dirs: Vec<String>,
}

impl SymlinkProbe {
    /// Probe over explicit directories.
    pub fn new<I, S>(dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Directories that are real directories on a stock device of this platform.
    pub fn platform_default() -> Self {
        Self::new(SYSTEM_DIRS.iter().copied())
    }
}

impl Probe for SymlinkProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        let mut inspected = 0usize;
        for dir in &self.dirs {
            let Ok(meta) = std::fs::symlink_metadata(Path::new(dir)) else {
                continue;
            };
            inspected += 1;
            if meta.file_type().is_symlink() {
                return ProbeResult::tampered(LABEL, dir.as_str());
            }
        }

        if inspected == 0 {
            return ProbeResult::inconclusive(LABEL, "no system directory could be inspected");
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

    #[test]
    #[cfg(unix)]
    fn test_symlinked_directory_is_tampered() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("Applications");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let result = SymlinkProbe::new([link.display().to_string()]).run();
        assert_eq!(result.status, ProbeStatus::Tampered);
    }

    #[test]
    fn test_real_directory_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let result = SymlinkProbe::new([dir.path().display().to_string()]).run();
        assert_eq!(result.status, ProbeStatus::Clean);
    }

    #[test]
    fn test_missing_directories_are_inconclusive() {
        let result = SymlinkProbe::new(["/nonexistent/jbdetect/Applications"]).run();
        assert_eq!(result.status, ProbeStatus::Inconclusive);
    }
}
