//! # jbdetect-ffi
//!
//! C-compatible interface for jbdetect.
//!
//! The three query functions keep the names existing host code calls. They
//! never fail: any internal problem yields `false`.
//!
//! ## Usage
//!
//! ```c
//! #include "jbdetect.h"
//!
//! static bool can_open(const char *scheme) {
//!     // ask UIApplication about scheme://
//! }
//!
//! int main() {
//!     jbdetect_set_url_scheme_handler(can_open);
//!     jbdetect_configure("{\"probe_timeout_ms\": 500}");
//!
//!     if (isJailbroken()) {
//!         uint8_t *report = NULL;
//!         size_t report_len = 0;
//!         if (jbdetect_last_report(&report, &report_len) == 0) {
//!             // log report (JSON)
//!             jbdetect_free(report);
//!         }
//!     }
//!     return 0;
//! }
//! ```

#![allow(clippy::missing_safety_doc)] // FFI functions are inherently unsafe

use std::ffi::{c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use jbdetect_core::{DetectConfig, DetectError, SchemeResolver};

/// Error codes returned by FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JbDetectError {
    /// Success.
    Success = 0,
    /// Null pointer or non-UTF-8 string.
    InvalidArgument = -1,
    /// Configuration rejected.
    ConfigError = -2,
    /// Serialization error.
    SerializationError = -4,
    /// Internal error.
    InternalError = -99,
}

impl From<&DetectError> for JbDetectError {
    fn from(e: &DetectError) -> Self {
        match e {
            DetectError::ConfigError { .. } => Self::ConfigError,
            DetectError::Serialization(_) => Self::SerializationError,
        }
    }
}

fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("JBDetect"),
        );
    }
}

/// Run a query, mapping a panic to `false`.
fn query(f: fn() -> bool) -> bool {
    init_logging();
    panic::catch_unwind(f).unwrap_or_else(|_| {
        tracing::error!("Detection panicked; reporting not jailbroken");
        false
    })
}

/// Whether the device appears jailbroken.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn isJailbroken() -> bool {
    query(jbdetect_core::is_jailbroken)
}

/// Alias of `isJailbroken`.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn isJailbreak() -> bool {
    query(jbdetect_core::is_jailbreak)
}

/// Class-method form of `isJailbroken` (`+[JBDetector isJailbreakFlagCheck]`).
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn JBDetector_isJailbreakFlagCheck() -> bool {
    query(jbdetect_core::JbDetector::is_jailbreak_flag_check)
}

/// Replace the process-wide configuration.
///
/// # Arguments
///
/// * `json` - Null-terminated JSON object; missing fields take defaults
///
/// # Returns
///
/// 0 on success, negative error code on failure. On failure the previous
/// configuration stays in effect.
///
/// # Safety
///
/// `json` must be a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn jbdetect_configure(json: *const libc::c_char) -> i32 {
    init_logging();
    if json.is_null() {
        return JbDetectError::InvalidArgument as i32;
    }

    let json = match CStr::from_ptr(json).to_str() {
        Ok(s) => s,
        Err(_) => return JbDetectError::InvalidArgument as i32,
    };

    let config = match DetectConfig::from_json(json) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Rejected configuration: {}", e);
            return JbDetectError::from(&e) as i32;
        },
    };

    match jbdetect_core::configure_shared(&config) {
        Ok(()) => JbDetectError::Success as i32,
        Err(e) => {
            tracing::error!("Failed to apply configuration: {}", e);
            JbDetectError::from(&e) as i32
        },
    }
}

/// Host callback answering "can `scheme://` be opened".
pub type SchemeHandler = extern "C" fn(scheme: *const libc::c_char) -> bool;

struct CallbackResolver(SchemeHandler);

impl SchemeResolver for CallbackResolver {
    fn can_open(&self, scheme: &str) -> Option<bool> {
        let scheme = CString::new(scheme).ok()?;
        Some((self.0)(scheme.as_ptr()))
    }
}

/// Install the callback backing the URL-scheme probe. NULL removes it.
///
/// The callback runs on the thread that called the query function, so a
/// host calling from its main thread may touch main-thread-only UI APIs.
#[no_mangle]
pub extern "C" fn jbdetect_set_url_scheme_handler(handler: Option<SchemeHandler>) -> i32 {
    let resolver = handler.map(|h| Arc::new(CallbackResolver(h)) as Arc<dyn SchemeResolver>);
    jbdetect_core::set_scheme_resolver(resolver);
    JbDetectError::Success as i32
}

/// Most recent verdict as JSON, computing one if none exists yet.
///
/// # Arguments
///
/// * `out` - Output pointer for report data (caller must free with `jbdetect_free`)
/// * `out_len` - Output pointer for report length
///
/// # Returns
///
/// 0 on success, negative error code on failure.
///
/// # Safety
///
/// `out` and `out_len` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn jbdetect_last_report(out: *mut *mut u8, out_len: *mut usize) -> i32 {
    init_logging();
    if out.is_null() || out_len.is_null() {
        return JbDetectError::InvalidArgument as i32;
    }

    let verdict = match panic::catch_unwind(AssertUnwindSafe(|| {
        let engine = jbdetect_core::shared();
        engine.last_verdict().unwrap_or_else(|| engine.verdict())
    })) {
        Ok(v) => v,
        Err(_) => return JbDetectError::InternalError as i32,
    };

    let report = match verdict.to_json() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to serialize report: {}", e);
            return JbDetectError::SerializationError as i32;
        },
    };

    // Allocate and copy report
    let len = report.len();
    let ptr = libc::malloc(len) as *mut u8;
    if ptr.is_null() {
        return JbDetectError::InternalError as i32;
    }

    std::ptr::copy_nonoverlapping(report.as_ptr(), ptr, len);

    *out = ptr;
    *out_len = len;

    JbDetectError::Success as i32
}

/// Free memory allocated by jbdetect functions.
///
/// # Safety
///
/// `data` must be a pointer returned by a jbdetect function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn jbdetect_free(data: *mut c_void) {
    if !data.is_null() {
        libc::free(data);
    }
}

/// Get the library version.
///
/// Returns a static string with the version number.
#[no_mangle]
pub extern "C" fn jbdetect_version() -> *const libc::c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const libc::c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn always_open(_scheme: *const libc::c_char) -> bool {
        true
    }

    /// Stands in for android_logger: records what reaches the `log` facade.
    struct CapturingLogger(std::sync::Mutex<Vec<String>>);

    impl log::Log for CapturingLogger {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(format!("{} {}", record.level(), record.args()));
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: CapturingLogger = CapturingLogger(std::sync::Mutex::new(Vec::new()));

    #[test]
    fn test_tracing_events_reach_log_backend() {
        log::set_logger(&CAPTURE).unwrap();
        log::set_max_level(log::LevelFilter::Trace);

        let json = CString::new(r#"{"probe_timeout_ms": 0}"#).unwrap();
        unsafe { jbdetect_configure(json.as_ptr()) };

        let lines = CAPTURE.0.lock().unwrap();
        assert!(
            lines
                .iter()
                .any(|l| l.starts_with("ERROR") && l.contains("Rejected configuration")),
            "captured: {lines:?}"
        );
    }

    #[test]
    fn test_version_is_nul_terminated() {
        let version = unsafe { CStr::from_ptr(jbdetect_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_configure_rejects_null() {
        assert_eq!(
            unsafe { jbdetect_configure(std::ptr::null()) },
            JbDetectError::InvalidArgument as i32
        );
    }

    #[test]
    fn test_configure_rejects_bad_json() {
        let json = CString::new("{not json").unwrap();
        assert_eq!(
            unsafe { jbdetect_configure(json.as_ptr()) },
            JbDetectError::SerializationError as i32
        );
    }

    #[test]
    fn test_configure_rejects_invalid_values() {
        let json = CString::new(r#"{"probe_timeout_ms": 0}"#).unwrap();
        assert_eq!(
            unsafe { jbdetect_configure(json.as_ptr()) },
            JbDetectError::ConfigError as i32
        );
    }

    #[test]
    fn test_callback_resolver_passes_scheme() {
        let resolver = CallbackResolver(always_open);
        assert_eq!(resolver.can_open("cydia"), Some(true));
        // Interior NUL cannot cross the C boundary
        assert_eq!(resolver.can_open("cy\0dia"), None);
    }

    #[test]
    fn test_last_report_rejects_null() {
        assert_eq!(
            unsafe { jbdetect_last_report(std::ptr::null_mut(), std::ptr::null_mut()) },
            JbDetectError::InvalidArgument as i32
        );
    }

    #[test]
    fn test_queries_agree_and_report_is_json() {
        let a = isJailbroken();
        let b = isJailbreak();
        let c = JBDetector_isJailbreakFlagCheck();
        assert_eq!(a, b);
        assert_eq!(b, c);

        let mut out: *mut u8 = std::ptr::null_mut();
        let mut len = 0usize;
        let code = unsafe { jbdetect_last_report(&mut out, &mut len) };
        assert_eq!(code, JbDetectError::Success as i32);

        let bytes = unsafe { std::slice::from_raw_parts(out, len) }.to_vec();
        unsafe { jbdetect_free(out as *mut c_void) };
        let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(report["is_tampered"].as_bool(), Some(a));
    }
}
