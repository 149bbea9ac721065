//! Debugger / tracer attachment.
//!
//! A traced process is common for tampering tools (Frida in attach mode,
//! lldb-based dumpers) but equally common for developers, so a positive
//! result carries [`Weight::Weak`].
//!
//! - Apple targets: `P_TRACED` in `kinfo_proc` via `sysctl(KERN_PROC_PID)`
//! - Linux/Android: `TracerPid` in `/proc/self/status`
//! - Windows: `IsDebuggerPresent` / `CheckRemoteDebuggerPresent`

use crate::error::ProbeError;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "debugger";

/// Checks whether another process is tracing this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebuggerProbe;

/// Query the kernel for `P_TRACED` (macOS/iOS).
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn is_traced() -> Result<bool, ProbeError> {
    // From <sys/proc.h>
    const P_TRACED: i32 = 0x0000_0800;

    // Only p_flag is needed, so a raw buffer stands in for kinfo_proc.
    // extern_proc starts with a 16-byte union followed by two pointers
    // (p_vmspace, p_sigacts); p_flag sits right after them on LP64.
    const KINFO_PROC_SIZE: usize = 648;
    const P_FLAG_OFFSET: usize = 32;

    let mut buf = [0u8; KINFO_PROC_SIZE];
    let mut size: libc::size_t = KINFO_PROC_SIZE;

    // SAFETY: mib has 4 valid entries and buf/size describe a writable buffer.
    let result = unsafe {
        let mut mib: [libc::c_int; 4] = [
            libc::CTL_KERN,
            libc::KERN_PROC,
            libc::KERN_PROC_PID,
            libc::getpid(),
        ];
        libc::sysctl(
            mib.as_mut_ptr(),
            4,
            buf.as_mut_ptr().cast::<libc::c_void>(),
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };

    if result != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    if size < P_FLAG_OFFSET + 4 {
        return Err(ProbeError::Query {
            reason: format!("kinfo_proc truncated to {size} bytes"),
        });
    }

    let mut flag = [0u8; 4];
    flag.copy_from_slice(&buf[P_FLAG_OFFSET..P_FLAG_OFFSET + 4]);
    Ok(i32::from_ne_bytes(flag) & P_TRACED != 0)
}

/// Read `TracerPid` from `/proc/self/status` (Linux/Android).
#[cfg(any(target_os = "linux", target_os = "android"))]
fn is_traced() -> Result<bool, ProbeError> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    tracer_pid(&status)
        .map(|pid| pid != 0)
        .ok_or_else(|| ProbeError::Query {
            reason: "TracerPid missing from /proc/self/status".into(),
        })
}

#[cfg(target_os = "windows")]
fn is_traced() -> Result<bool, ProbeError> {
    use windows_sys::Win32::System::Diagnostics::Debug::{
        CheckRemoteDebuggerPresent, IsDebuggerPresent,
    };
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    // SAFETY: both calls only read state of the current process.
    unsafe {
        if IsDebuggerPresent() != 0 {
            return Ok(true);
        }
        let mut remote: i32 = 0;
        if CheckRemoteDebuggerPresent(GetCurrentProcess(), &mut remote) == 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(remote != 0)
    }
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "linux",
    target_os = "android",
    target_os = "windows"
)))]
fn is_traced() -> Result<bool, ProbeError> {
    Err(ProbeError::Unsupported {
        platform: ProbeError::current_platform(),
    })
}

/// Parse the `TracerPid:` field of a proc status file.
#[cfg_attr(
    not(any(target_os = "linux", target_os = "android")),
    allow(dead_code)
)]
fn tracer_pid(status: &str) -> Option<i32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|rest| rest.trim().parse().ok())
}

impl Probe for DebuggerProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        match is_traced() {
            Ok(true) => ProbeResult::tampered(LABEL, "process is being traced"),
            Ok(false) => ProbeResult::clean(LABEL),
            Err(e) => ProbeResult::inconclusive_from(LABEL, &e),
        }
    }

    fn weight(&self) -> Weight {
        Weight::Weak
    }
}
