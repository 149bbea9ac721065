//! Sandbox escape.
//!
//! Attempts two operations the app sandbox forbids: creating a file outside
//! the app container and spawning an external process. Either succeeding
//! means the sandbox is not enforced.
//!
//! Both side effects are owned by scope guards ([`ScopedFile`],
//! [`ScopedChild`]) that undo them on drop, so the probe leaves the
//! filesystem and process table as it found them on every exit path,
//! including early returns and panics.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::config::DetectConfig;
use crate::error::ProbeError;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "sandbox";

/// Removes a file this probe created.
///
/// Only files created with `create_new` are ever removed, so a
/// pre-existing file at the probe path is never touched.
struct ScopedFile {
    path: PathBuf,
    created: bool,
}

impl ScopedFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            created: false,
        }
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if !self.created {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Sandbox: failed to remove probe file"
            );
        }
    }
}

/// Kills and reaps a child this probe spawned.
struct ScopedChild(Child);

impl Drop for ScopedChild {
    fn drop(&mut self) {
        // Already-exited children make kill() fail; wait() still reaps them
        let _ = self.0.kill();
        if let Err(e) = self.0.wait() {
            warn!(pid = self.0.id(), error = %e, "Sandbox: failed to reap probe child");
        }
    }
}

/// Outcome of one escape attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Escape {
    /// The forbidden operation succeeded; carries the result detail.
    Succeeded(String),
    /// The OS refused it.
    Denied,
}

/// Tries to write outside the container and to spawn a process.
#[derive(Debug, Clone)]
pub struct SandboxProbe {
    write_path: PathBuf,
    spawn_path: Option<PathBuf>,
}

impl SandboxProbe {
    /// Probe with explicit targets. `spawn_path = None` skips the spawn check.
    pub fn new(write_path: impl Into<PathBuf>, spawn_path: Option<PathBuf>) -> Self {
        Self {
            write_path: write_path.into(),
            spawn_path,
        }
    }

    /// Targets from configuration.
    ///
    /// The spawn check only runs on iOS; every other platform lets
    /// ordinary processes spawn children.
    pub fn from_config(config: &DetectConfig) -> Self {
        let spawn_path = if cfg!(target_os = "ios") {
            Some(PathBuf::from(&config.spawn_path))
        } else {
            None
        };
        Self::new(&config.sandbox_write_path, spawn_path)
    }

    fn try_write(&self) -> Result<Escape, ProbeError> {
        let mut guard = ScopedFile::new(&self.write_path);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.write_path)
        {
            Ok(f) => f,
            Err(e) if is_denial(&e) => return Ok(Escape::Denied),
            Err(e) => return Err(e.into()),
        };
        guard.created = true;
        // Creating the file is already the escape; the payload is incidental
        if let Err(e) = file.write_all(b"jbdetect") {
            debug!(error = %e, "Sandbox: payload write failed after create");
        }
        debug!(path = %self.write_path.display(), "Sandbox: wrote outside container");
        Ok(Escape::Succeeded(format!("wrote {}", self.write_path.display())))
    }

    fn try_spawn(&self, path: &Path) -> Result<Escape, ProbeError> {
        let child = match Command::new(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => ScopedChild(c),
            Err(e) if is_denial(&e) => return Ok(Escape::Denied),
            Err(e) => return Err(e.into()),
        };
        let pid = child.0.id();
        debug!(pid, path = %path.display(), "Sandbox: spawned process");
        Ok(Escape::Succeeded(format!("spawned {} (pid {pid})", path.display())))
    }
}

/// Whether an I/O error means the OS refused the operation.
fn is_denial(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(
            e.raw_os_error(),
            Some(libc::EPERM | libc::EACCES | libc::EROFS)
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

impl Probe for SandboxProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        let mut attempts = vec![("write", self.try_write())];
        if let Some(path) = &self.spawn_path {
            attempts.push(("spawn", self.try_spawn(path)));
        }

        if let Some(detail) = attempts.iter().find_map(|(_, r)| match r {
            Ok(Escape::Succeeded(detail)) => Some(detail.clone()),
            _ => None,
        }) {
            return ProbeResult::tampered(LABEL, detail);
        }

        if attempts.iter().any(|(_, r)| matches!(r, Ok(Escape::Denied))) {
            return ProbeResult::clean(LABEL);
        }

        let detail = attempts
            .iter()
            .filter_map(|(kind, r)| r.as_ref().err().map(|e| format!("{kind}: {e}")))
            .collect::<Vec<_>>()
            .join("; ");
        ProbeResult::inconclusive(LABEL, detail)
    }

    fn weight(&self) -> Weight {
        Weight::Strong
    }

    fn has_scoped_side_effect(&self) -> bool {
        true
    }
}
