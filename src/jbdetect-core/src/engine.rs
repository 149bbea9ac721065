//! Detection engine: an aggregator paired with its verdict cache.
//!
//! Every facade entry point resolves to [`DetectionEngine::is_tampered`] on
//! the process-wide engine returned by [`shared`]. Tests and embedders that
//! need isolation construct their own engine instead.
//!
//! ## Process-wide engine
//!
//! - Created lazily with [`DetectConfig::default`] on first use.
//! - Replaced wholesale by [`configure_shared`]; the replacement starts with
//!   an empty cache. Callers already holding the previous `Arc` finish
//!   against it.
//! - Never torn down before process exit.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::info;

use crate::aggregator::Aggregator;
use crate::cache::VerdictCache;
use crate::config::DetectConfig;
use crate::error::DetectError;
use crate::probe::ProbeRegistry;
use crate::types::Verdict;

/// An aggregator and the cache in front of it.
#[derive(Debug)]
pub struct DetectionEngine {
    aggregator: Aggregator,
    cache: VerdictCache,
}

impl DetectionEngine {
    /// Engine over the built-in probes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(config: &DetectConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self::with_registry(ProbeRegistry::standard(config), config))
    }

    /// Engine over a caller-supplied registry.
    ///
    /// Only the timeout and cache settings of `config` are used.
    pub fn with_registry(registry: ProbeRegistry, config: &DetectConfig) -> Self {
        info!(
            probes = ?registry.labels(),
            probe_timeout_ms = config.probe_timeout_ms,
            cache_ttl_ms = config.cache_ttl_ms,
            "DetectionEngine: initialized"
        );
        Self {
            aggregator: Aggregator::new(registry, config.probe_timeout()),
            cache: VerdictCache::new(config.cache_ttl()),
        }
    }

    /// Current verdict, from cache when fresh.
    pub fn verdict(&self) -> Verdict {
        self.cache.get_or_compute(|| self.aggregator.run())
    }

    /// Current boolean verdict.
    pub fn is_tampered(&self) -> bool {
        self.verdict().is_tampered
    }

    /// Last computed verdict, however old, without running probes.
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.cache.latest()
    }

    /// Force the next query to run the probes.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// The underlying aggregator.
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}

impl Default for DetectionEngine {
    fn default() -> Self {
        let config = DetectConfig::default();
        Self::with_registry(ProbeRegistry::standard(&config), &config)
    }
}

static SHARED: OnceLock<RwLock<Arc<DetectionEngine>>> = OnceLock::new();

fn shared_slot() -> &'static RwLock<Arc<DetectionEngine>> {
    SHARED.get_or_init(|| RwLock::new(Arc::new(DetectionEngine::default())))
}

/// The process-wide engine.
pub fn shared() -> Arc<DetectionEngine> {
    Arc::clone(&shared_slot().read().unwrap_or_else(PoisonError::into_inner))
}

/// Replace the process-wide engine with one built from `config`.
///
/// # Errors
///
/// Returns `ConfigError` if `config` fails validation; the current engine
/// stays in place.
pub fn configure_shared(config: &DetectConfig) -> Result<(), DetectError> {
    let engine = Arc::new(DetectionEngine::new(config)?);
    *shared_slot().write().unwrap_or_else(PoisonError::into_inner) = engine;
    Ok(())
}
