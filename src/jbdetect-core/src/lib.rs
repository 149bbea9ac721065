//! # jbdetect-core
//!
//! Best-effort jailbreak and runtime tamper detection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │   is_jailbroken()   is_jailbreak()   JbDetector::…()        │
//! │                          │                                   │
//! │                          ▼                                   │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │              DetectionEngine                      │       │
//! │  │   VerdictCache (freshness window, RwLock)        │       │
//! │  └──────────────────────────────────────────────────┘       │
//! │                          │ miss                              │
//! │                          ▼                                   │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │              Aggregator                           │       │
//! │  │   parallel probes, per-probe deadline,           │       │
//! │  │   any-positive reduction                         │       │
//! │  └──────────────────────────────────────────────────┘       │
//! │                          │                                   │
//! │                          ▼                                   │
//! │  ┌────────────┐ ┌─────────┐ ┌───────┐ ┌────────────┐        │
//! │  │ filesystem │ │ sandbox │ │ dylib │ │ url_scheme │  …     │
//! │  └────────────┘ └─────────┘ └───────┘ └────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Properties
//!
//! - **Any-positive**: one `Tampered` probe makes the verdict tampered
//! - **Failures are silent**: errors, denials and timeouts are `Inconclusive`
//! - **No residue**: the sandbox probe undoes its own side effects before
//!   the verdict is returned, unless it overruns the join cap
//! - **Caller's thread**: probes that call host UI APIs run on the thread
//!   that asked for the verdict
//!
//! This is a heuristic layer. It does not resist an attacker who patches
//! this library.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod probe;
pub mod probes;
pub mod types;

pub use aggregator::{reduce, Aggregator};
pub use cache::VerdictCache;
pub use config::DetectConfig;
pub use engine::{configure_shared, shared, DetectionEngine};
pub use error::{DetectError, ProbeError};
pub use facade::{is_jailbreak, is_jailbroken, JbDetector};
pub use probe::{Probe, ProbeRegistry, Weight};
pub use probes::{set_scheme_resolver, SchemeResolver};
pub use types::{ProbeResult, ProbeStatus, Verdict};
