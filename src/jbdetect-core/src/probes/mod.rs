//! Built-in probes.
//!
//! Each submodule inspects one environmental signal. Platform-specific
//! code paths follow the same layout throughout: Apple targets use dyld
//! and sysctl, Linux/Android use `/proc`, and everything else reports
//! `Inconclusive`.

pub mod bundle;
pub mod debugger;
pub mod dylib;
pub mod environment;
pub mod filesystem;
pub mod instrumentation;
pub mod sandbox;
pub mod symbols;
pub mod symlink;
pub mod url_scheme;

use std::sync::Arc;

use crate::config::DetectConfig;
use crate::probe::Probe;

pub use bundle::BundleProbe;
pub use debugger::DebuggerProbe;
pub use dylib::DylibProbe;
pub use environment::EnvironmentProbe;
pub use filesystem::FilesystemProbe;
pub use instrumentation::InstrumentationPortProbe;
pub use sandbox::SandboxProbe;
pub use symbols::SymbolHookProbe;
pub use symlink::SymlinkProbe;
pub use url_scheme::{set_scheme_resolver, SchemeResolver, UrlSchemeProbe};

/// Labels of every built-in probe, in registry order.
pub const ALL_LABELS: &[&str] = &[
    filesystem::LABEL,
    sandbox::LABEL,
    dylib::LABEL,
    url_scheme::LABEL,
    debugger::LABEL,
    environment::LABEL,
    symlink::LABEL,
    symbols::LABEL,
    instrumentation::LABEL,
    bundle::LABEL,
];

/// Build every built-in probe from configuration.
pub(crate) fn standard_probes(config: &DetectConfig) -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(FilesystemProbe::from_config(config)),
        Arc::new(SandboxProbe::from_config(config)),
        Arc::new(DylibProbe::from_config(config)),
        Arc::new(UrlSchemeProbe::from_config(config)),
        Arc::new(DebuggerProbe),
        Arc::new(EnvironmentProbe::from_config(config)),
        Arc::new(SymlinkProbe::platform_default()),
        Arc::new(SymbolHookProbe::platform_default()),
        Arc::new(InstrumentationPortProbe::default()),
        Arc::new(BundleProbe::from_config(config)),
    ]
}
