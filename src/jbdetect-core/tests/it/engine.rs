//! End-to-end detection through the engine and the process-wide facade.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jbdetect_core::probes::{FilesystemProbe, SandboxProbe};
use jbdetect_core::{
    configure_shared, is_jailbreak, is_jailbroken, probes, DetectConfig, DetectionEngine,
    JbDetector, Probe, ProbeRegistry, ProbeResult, ProbeStatus,
};

use crate::common::ForcedProbe;

fn config(cache_ttl_ms: u64) -> DetectConfig {
    DetectConfig {
        probe_timeout_ms: 500,
        cache_ttl_ms,
        ..DetectConfig::default()
    }
}

#[test]
fn jailbreak_artifact_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("Cydia.app");
    std::fs::create_dir(&artifact).unwrap();
    let missing = dir.path().join("bin").join("bash");

    let registry = ProbeRegistry::new()
        .with(FilesystemProbe::new([
            missing.to_string_lossy().into_owned(),
            artifact.to_string_lossy().into_owned(),
        ]))
        .with(ForcedProbe::new("sandbox", ProbeStatus::Clean))
        .with(ForcedProbe::new("dylib", ProbeStatus::Clean))
        .with(ForcedProbe::new("url_scheme", ProbeStatus::Inconclusive));
    let engine = DetectionEngine::with_registry(registry, &config(5_000));

    let verdict = engine.verdict();
    assert!(verdict.is_tampered);
    assert_eq!(verdict.fired_labels(), vec!["filesystem"]);
    assert_eq!(
        verdict.fired[0].detail.as_deref(),
        Some(artifact.to_string_lossy().as_ref())
    );
}

#[test]
fn clean_device_is_not_reported() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ProbeRegistry::new()
        .with(FilesystemProbe::new([dir
            .path()
            .join("Applications/Cydia.app")
            .to_string_lossy()
            .into_owned()]))
        .with(ForcedProbe::new("sandbox", ProbeStatus::Clean))
        .with(ForcedProbe::new("dylib", ProbeStatus::Clean));
    let engine = DetectionEngine::with_registry(registry, &config(5_000));

    let verdict = engine.verdict();
    assert!(!verdict.is_tampered);
    assert!(verdict.fired.is_empty());
    assert_eq!(verdict.inconclusive, 0);
    assert!((verdict.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn unusable_probes_fail_open() {
    let dir = tempfile::tempdir().unwrap();
    // Parent directory does not exist, so the write is neither allowed nor denied
    let target = dir.path().join("absent").join("probe.txt");

    let registry = ProbeRegistry::new()
        .with(FilesystemProbe::new(Vec::<String>::new()))
        .with(SandboxProbe::new(&target, None))
        .with(ForcedProbe::new("dylib", ProbeStatus::Inconclusive));
    let engine = DetectionEngine::with_registry(registry, &config(5_000));

    let verdict = engine.verdict();
    assert!(!verdict.is_tampered);
    assert_eq!(verdict.inconclusive, 3);
    assert_eq!(verdict.confidence, 0.0);
    assert!(!target.exists());
}

struct Counting {
    runs: Arc<AtomicUsize>,
}

impl Probe for Counting {
    fn label(&self) -> &'static str {
        "counting"
    }

    fn run(&self) -> ProbeResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        ProbeResult::clean("counting")
    }
}

#[test]
fn verdict_is_reused_inside_window() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = ProbeRegistry::new().with(Counting {
        runs: Arc::clone(&runs),
    });
    let engine = DetectionEngine::with_registry(registry, &config(60_000));

    let first = engine.verdict();
    for _ in 0..5 {
        assert_eq!(engine.verdict(), first);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn verdict_is_recomputed_after_window() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = ProbeRegistry::new().with(Counting {
        runs: Arc::clone(&runs),
    });
    let engine = DetectionEngine::with_registry(registry, &config(30));

    engine.verdict();
    thread::sleep(Duration::from_millis(60));
    engine.verdict();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_queries_share_one_evaluation() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = ProbeRegistry::new().with(Counting {
        runs: Arc::clone(&runs),
    });
    let engine = Arc::new(DetectionEngine::with_registry(registry, &config(60_000)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.is_tampered())
        })
        .collect();
    for handle in handles {
        assert!(!handle.join().unwrap());
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn facade_reports_configured_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("frida-server");
    std::fs::write(&artifact, b"").unwrap();

    let config = DetectConfig {
        extra_paths: vec![artifact.to_string_lossy().into_owned()],
        disabled_probes: probes::ALL_LABELS
            .iter()
            .filter(|label| **label != "filesystem")
            .map(|label| (*label).to_string())
            .collect(),
        ..DetectConfig::default()
    };
    configure_shared(&config).unwrap();

    assert!(is_jailbroken());
    assert!(is_jailbreak());
    assert!(JbDetector::is_jailbreak_flag_check());

    let verdict = jbdetect_core::shared().last_verdict().unwrap();
    assert_eq!(verdict.fired_labels(), vec!["filesystem"]);
}
