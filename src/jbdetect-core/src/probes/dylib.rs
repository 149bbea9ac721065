//! Injected library detection.
//!
//! Enumerates the code images loaded into the current process and flags
//! names that belong to tweak loaders and hooking frameworks.
//!
//! - Apple targets: `_dyld_image_count` / `_dyld_get_image_name`
//! - Linux/Android: mapped file paths in `/proc/self/maps`

use tracing::debug;

use crate::config::DetectConfig;
use crate::error::ProbeError;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "dylib";

/// Lowercase substrings of known injection/hooking images.
const BUILTIN_KEYWORDS: &[&str] = &[
    "mobilesubstrate",
    "substrate",
    "substitute",
    "tweakinject",
    "libhooker",
    "ellekit",
    "cydia",
    "frida",
    "cycript",
    "sslkillswitch",
    "choicy",
    "crane",
    "leftpan",
    "flex",
    "iapstore",
    "injection",
    "tweak",
];

/// Flags loaded images whose names contain a hooking keyword.
#[derive(Debug, Clone)]
pub struct DylibProbe {
    keywords: Vec<String>,
}

impl DylibProbe {
    /// Probe over explicit keywords (matched case-insensitively).
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }

    /// `config.dylib_keywords`, or the built-in list when empty.
    pub fn from_config(config: &DetectConfig) -> Self {
        if config.dylib_keywords.is_empty() {
            Self::new(BUILTIN_KEYWORDS.iter().copied())
        } else {
            Self::new(config.dylib_keywords.iter().cloned())
        }
    }

    /// First image matching a keyword, with the keyword.
    pub fn find_suspicious<'a>(&self, images: &'a [String]) -> Option<(&'a str, &str)> {
        images.iter().find_map(|image| {
            let lower = image.to_lowercase();
            self.keywords
                .iter()
                .find(|k| lower.contains(k.as_str()))
                .map(|k| (image.as_str(), k.as_str()))
        })
    }
}

/// Names of every image loaded into this process.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn loaded_images() -> Result<Vec<String>, ProbeError> {
    use std::ffi::CStr;
    use std::os::raw::c_char;

    extern "C" {
        fn _dyld_image_count() -> u32;
        fn _dyld_get_image_name(image_index: u32) -> *const c_char;
    }

    let mut images = Vec::new();
    // SAFETY: dyld returns NUL-terminated names owned by the loader, or NULL
    // if an image was unloaded between the count and the lookup.
    unsafe {
        let count = _dyld_image_count();
        for i in 0..count {
            let name = _dyld_get_image_name(i);
            if !name.is_null() {
                images.push(CStr::from_ptr(name).to_string_lossy().into_owned());
            }
        }
    }

    if images.is_empty() {
        return Err(ProbeError::Query {
            reason: "dyld reported no images".into(),
        });
    }
    Ok(images)
}

/// Names of every file mapped into this process.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn loaded_images() -> Result<Vec<String>, ProbeError> {
    let maps = std::fs::read_to_string("/proc/self/maps")?;
    Ok(parse_maps(&maps))
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "linux",
    target_os = "android"
)))]
/// Image enumeration is not available on this platform.
pub fn loaded_images() -> Result<Vec<String>, ProbeError> {
    Err(ProbeError::Unsupported {
        platform: ProbeError::current_platform(),
    })
}

/// Unique file-backed mapping paths from `/proc/<pid>/maps` content.
///
/// Each line is `address perms offset dev inode [pathname]`; only absolute
/// pathnames are kept, anonymous and `[heap]`-style mappings are skipped.
#[cfg_attr(
    not(any(target_os = "linux", target_os = "android")),
    allow(dead_code)
)]
fn parse_maps(maps: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for line in maps.lines() {
        let Some(path) = line.splitn(6, char::is_whitespace).nth(5) else {
            continue;
        };
        let path = path.trim();
        if path.starts_with('/') && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

impl Probe for DylibProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        let images = match loaded_images() {
            Ok(images) => images,
            Err(e) => return ProbeResult::inconclusive_from(LABEL, &e),
        };

        match self.find_suspicious(&images) {
            Some((image, keyword)) => {
                debug!(image = %image, keyword = %keyword, "Dylib: suspicious image loaded");
                ProbeResult::tampered(LABEL, image)
            },
            None => ProbeResult::clean(LABEL),
        }
    }

    fn weight(&self) -> Weight {
        Weight::Strong
    }
}
