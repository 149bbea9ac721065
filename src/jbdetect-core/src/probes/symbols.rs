//! Relocated loader symbols.
//!
//! Hooking frameworks interpose `dlopen` (and `objc_msgSend` on Apple
//! targets) so that the default symbol resolves into their own image.
//! `dladdr` reports which image owns the resolved address; anything outside
//! the system library directories, other than this executable itself, is
//! treated as a hook.

use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "symbol_hook";

#[cfg(any(target_os = "macos", target_os = "ios"))]
const SYMBOLS: &[&str] = &["dlopen", "objc_msgSend"];

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const SYMBOLS: &[&str] = &["dlopen"];

#[cfg(any(target_os = "macos", target_os = "ios"))]
const SYSTEM_PREFIXES: &[&str] = &["/usr/lib/", "/System/Library/"];

#[cfg(target_os = "android")]
const SYSTEM_PREFIXES: &[&str] = &["/system/", "/apex/", "/vendor/"];

#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "android")))]
const SYSTEM_PREFIXES: &[&str] = &["/lib/", "/lib64/", "/usr/lib/", "/usr/lib64/", "/nix/store/"];

/// Checks that loader symbols resolve into system images.
#[derive(Debug, Clone)]
pub struct SymbolHookProbe {
    symbols: Vec<String>,
    prefixes: Vec<String>,
}

impl SymbolHookProbe {
    /// Probe over explicit symbols and trusted path prefixes.
    pub fn new(symbols: Vec<String>, prefixes: Vec<String>) -> Self {
        Self { symbols, prefixes }
    }

    /// Loader symbols and system prefixes for this platform.
    pub fn platform_default() -> Self {
        Self::new(
            SYMBOLS.iter().map(|s| (*s).to_string()).collect(),
            SYSTEM_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
        )
    }

    /// Whether an owning image path is trusted.
    pub fn is_trusted_owner(&self, owner: &str, own_exe: Option<&str>) -> bool {
        own_exe == Some(owner) || self.prefixes.iter().any(|p| owner.starts_with(p.as_str()))
    }
}

/// Path of the image that owns the default definition of `symbol`.
#[cfg(unix)]
fn symbol_owner(symbol: &str) -> Option<String> {
    use std::ffi::{CStr, CString};

    let name = CString::new(symbol).ok()?;
    // SAFETY: name is NUL-terminated; dladdr fills info only on success and
    // dli_fname points into loader-owned memory valid for the process lifetime.
    unsafe {
        let addr = libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr());
        if addr.is_null() {
            return None;
        }
        let mut info: libc::Dl_info = std::mem::zeroed();
        if libc::dladdr(addr, &mut info) == 0 || info.dli_fname.is_null() {
            return None;
        }
        Some(CStr::from_ptr(info.dli_fname).to_string_lossy().into_owned())
    }
}

#[cfg(not(unix))]
fn symbol_owner(_symbol: &str) -> Option<String> {
    None
}

impl Probe for SymbolHookProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        let own_exe = std::env::current_exe()
            .ok()
            .map(|p| p.to_string_lossy().into_owned());

        let mut resolved = 0usize;
        for symbol in &self.symbols {
            let Some(owner) = symbol_owner(symbol) else {
                continue;
            };
            resolved += 1;
            if !self.is_trusted_owner(&owner, own_exe.as_deref()) {
                return ProbeResult::tampered(LABEL, format!("{symbol} resolved to {owner}"));
            }
        }

        if resolved == 0 {
            return ProbeResult::inconclusive(LABEL, "no loader symbol could be resolved");
        }
        ProbeResult::clean(LABEL)
    }

    fn weight(&self) -> Weight {
        Weight::Moderate
    }
}
