//! URL schemes registered by jailbreak tooling.
//!
//! Whether a scheme can be opened is only answerable by the host UI
//! framework, so the probe asks a [`SchemeResolver`]. The host installs one
//! process-wide with [`set_scheme_resolver`]; until it does, the probe is
//! `Inconclusive`.
//!
//! Host UI frameworks only answer on the thread that owns them, so the
//! probe runs inline on the thread that requested the verdict.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::DetectConfig;
use crate::error::ProbeError;
use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "url_scheme";

/// Schemes registered only by jailbreak stores and TrollStore-era apps.
const BUILTIN_SCHEMES: &[&str] = &[
    "cydia",
    "sileo",
    "zbra",
    "filza",
    "adm",
    "mterminal",
    "trapp",
    "legizmo",
    "copylog",
    "trollspeed",
    "cowabunga",
    "misaka",
    "helium",
    "Battery-Life_Cydia",
    "floatingball",
    "netfenceapp",
    "undecimus",
    "apt-repo",
];

/// Answers whether a URL scheme can be opened on this device.
pub trait SchemeResolver: Send + Sync {
    /// `Some(true)` if `scheme://` is openable, `Some(false)` if not,
    /// `None` if the host could not tell.
    fn can_open(&self, scheme: &str) -> Option<bool>;
}

impl<F> SchemeResolver for F
where
    F: Fn(&str) -> Option<bool> + Send + Sync,
{
    fn can_open(&self, scheme: &str) -> Option<bool> {
        self(scheme)
    }
}

/// Resolver installed by the host, shared by every engine in the process.
static HOST_RESOLVER: RwLock<Option<Arc<dyn SchemeResolver>>> = RwLock::new(None);

/// Install (or with `None`, remove) the process-wide resolver.
pub fn set_scheme_resolver(resolver: Option<Arc<dyn SchemeResolver>>) {
    *HOST_RESOLVER
        .write()
        .unwrap_or_else(PoisonError::into_inner) = resolver;
}

fn host_resolver() -> Option<Arc<dyn SchemeResolver>> {
    HOST_RESOLVER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[derive(Clone)]
enum ResolverSource {
    /// Whatever the host has installed at run time.
    Host,
    /// A resolver owned by this probe.
    Fixed(Arc<dyn SchemeResolver>),
}

/// Checks whether any jailbreak-tooling URL scheme is openable.
#[derive(Clone)]
pub struct UrlSchemeProbe {
    schemes: Vec<String>,
    source: ResolverSource,
}

impl std::fmt::Debug for UrlSchemeProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSchemeProbe")
            .field("schemes", &self.schemes)
            .field("fixed_resolver", &matches!(self.source, ResolverSource::Fixed(_)))
            .finish()
    }
}

impl UrlSchemeProbe {
    /// Probe backed by the host-installed resolver.
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
            source: ResolverSource::Host,
        }
    }

    /// `config.url_schemes`, or the built-in list when empty.
    pub fn from_config(config: &DetectConfig) -> Self {
        if config.url_schemes.is_empty() {
            Self::new(BUILTIN_SCHEMES.iter().copied())
        } else {
            Self::new(config.url_schemes.iter().cloned())
        }
    }

    /// Use `resolver` instead of the process-wide one.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn SchemeResolver>) -> Self {
        self.source = ResolverSource::Fixed(resolver);
        self
    }

    fn resolver(&self) -> Option<Arc<dyn SchemeResolver>> {
        match &self.source {
            ResolverSource::Host => host_resolver(),
            ResolverSource::Fixed(r) => Some(Arc::clone(r)),
        }
    }
}

impl Probe for UrlSchemeProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        let Some(resolver) = self.resolver() else {
            let err = ProbeError::MissingHost {
                what: "URL scheme resolver",
            };
            return ProbeResult::inconclusive_from(LABEL, &err);
        };

        let mut answered = 0usize;
        for scheme in &self.schemes {
            match resolver.can_open(scheme) {
                Some(true) => {
                    debug!(scheme = %scheme, "UrlScheme: jailbreak scheme openable");
                    return ProbeResult::tampered(LABEL, format!("{scheme}://"));
                },
                Some(false) => answered += 1,
                None => {},
            }
        }

        if answered == 0 {
            return ProbeResult::inconclusive(LABEL, "resolver could not answer for any scheme");
        }
        ProbeResult::clean(LABEL)
    }

    fn weight(&self) -> Weight {
        Weight::Strong
    }

    fn runs_inline(&self) -> bool {
        true
    }
}
