//! The sandbox probe leaves nothing behind, whatever the deadline.

use std::time::Duration;

use jbdetect_core::probes::SandboxProbe;
use jbdetect_core::{Aggregator, Probe, ProbeRegistry, ProbeStatus};

use crate::common::ForcedProbe;

#[test]
fn successful_write_is_tampered_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("jailbreak_probe.txt");

    let result = SandboxProbe::new(&target, None).run();

    assert_eq!(result.status, ProbeStatus::Tampered);
    assert!(!target.exists());
}

#[test]
fn no_residue_after_aggregated_run() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("jailbreak_probe.txt");

    let registry = ProbeRegistry::new()
        .with(SandboxProbe::new(&target, None))
        .with(ForcedProbe::new("alpha", ProbeStatus::Clean));
    let verdict = Aggregator::new(registry, Duration::from_secs(2)).run();

    assert!(verdict.is_tampered);
    assert_eq!(verdict.fired_labels(), vec!["sandbox"]);
    assert!(!target.exists());
}

#[test]
fn no_residue_even_when_deadline_is_missed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("jailbreak_probe.txt");

    let registry = ProbeRegistry::new()
        .with(SandboxProbe::new(&target, None))
        .with(ForcedProbe::new("alpha", ProbeStatus::Clean).delayed(Duration::from_millis(200)));
    for _ in 0..10 {
        let _ = Aggregator::new(registry.clone(), Duration::from_millis(1)).run();
        assert!(!target.exists());
    }
}

#[test]
fn preexisting_file_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("jailbreak_probe.txt");
    std::fs::write(&target, b"owned by someone else").unwrap();

    let result = SandboxProbe::new(&target, None).run();

    assert_ne!(result.status, ProbeStatus::Tampered);
    assert_eq!(std::fs::read(&target).unwrap(), b"owned by someone else");
}
