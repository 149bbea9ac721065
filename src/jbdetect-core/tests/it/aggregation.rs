//! Properties of the any-positive reduction.

use std::time::Duration;

use proptest::prelude::*;

use jbdetect_core::{Aggregator, ProbeRegistry, ProbeStatus};

use crate::common::{ForcedProbe, LABELS};

fn status() -> impl Strategy<Value = ProbeStatus> {
    prop_oneof![
        Just(ProbeStatus::Tampered),
        Just(ProbeStatus::Clean),
        Just(ProbeStatus::Inconclusive),
    ]
}

/// Up to eight probes with distinct labels.
fn forced_probes() -> impl Strategy<Value = Vec<ForcedProbe>> {
    prop::collection::vec(status(), 0..=LABELS.len()).prop_map(|statuses| {
        statuses
            .into_iter()
            .zip(LABELS.iter().copied())
            .map(|(status, label)| ForcedProbe::new(label, status))
            .collect()
    })
}

fn registry(probes: &[ForcedProbe]) -> ProbeRegistry {
    probes
        .iter()
        .cloned()
        .fold(ProbeRegistry::new(), |registry, probe| registry.with(probe))
}

fn aggregator(probes: &[ForcedProbe]) -> Aggregator {
    Aggregator::new(registry(probes), Duration::from_secs(2))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    /// The verdict is tampered iff some probe reported tampered.
    #[test]
    fn verdict_is_any_positive(probes in forced_probes()) {
        let verdict = aggregator(&probes).run();
        let expected = probes.iter().any(|p| p.status == ProbeStatus::Tampered);
        prop_assert_eq!(verdict.is_tampered, expected);
        prop_assert_eq!(verdict.probes_run, probes.len());

        let inconclusive = probes
            .iter()
            .filter(|p| p.status == ProbeStatus::Inconclusive)
            .count();
        prop_assert_eq!(verdict.inconclusive, inconclusive);
    }

    /// Registry order never changes the verdict.
    #[test]
    fn verdict_is_order_independent(
        (probes, shuffled) in forced_probes()
            .prop_flat_map(|p| (Just(p.clone()), Just(p).prop_shuffle()))
    ) {
        let a = aggregator(&probes).run();
        let b = aggregator(&shuffled).run();

        prop_assert_eq!(a.is_tampered, b.is_tampered);
        prop_assert_eq!(a.inconclusive, b.inconclusive);
        prop_assert!((a.confidence - b.confidence).abs() < 1e-9);

        let mut fired_a = a.fired_labels();
        let mut fired_b = b.fired_labels();
        fired_a.sort_unstable();
        fired_b.sort_unstable();
        prop_assert_eq!(fired_a, fired_b);
    }

    /// Inconclusive results alone never produce a tampered verdict.
    #[test]
    fn inconclusive_never_tampers(count in 0usize..=LABELS.len()) {
        let probes: Vec<_> = LABELS[..count]
            .iter()
            .copied()
            .map(|label| ForcedProbe::new(label, ProbeStatus::Inconclusive))
            .collect();
        let verdict = aggregator(&probes).run();
        prop_assert!(!verdict.is_tampered);
        prop_assert!(verdict.fired.is_empty());
    }
}

#[test]
fn late_positive_does_not_flip_clean_verdict() {
    let probes = [
        ForcedProbe::new("alpha", ProbeStatus::Clean),
        ForcedProbe::new("bravo", ProbeStatus::Clean),
        ForcedProbe::new("charlie", ProbeStatus::Tampered).delayed(Duration::from_millis(400)),
    ];
    let verdict = Aggregator::new(registry(&probes), Duration::from_millis(40)).run();

    assert!(!verdict.is_tampered);
    assert_eq!(verdict.inconclusive, 1);
    assert_eq!(verdict.probes_run, 3);
}

#[test]
fn slow_probes_do_not_stall_the_verdict() {
    let probes: Vec<_> = LABELS
        .iter()
        .copied()
        .map(|label| ForcedProbe::new(label, ProbeStatus::Clean).delayed(Duration::from_secs(3)))
        .collect();

    let start = std::time::Instant::now();
    let verdict = Aggregator::new(registry(&probes), Duration::from_millis(50)).run();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(verdict.inconclusive, LABELS.len());
    assert_eq!(verdict.confidence, 0.0);
}

#[test]
fn fired_keeps_registry_order() {
    let probes = [
        ForcedProbe::new("delta", ProbeStatus::Tampered).delayed(Duration::from_millis(30)),
        ForcedProbe::new("alpha", ProbeStatus::Clean),
        ForcedProbe::new("bravo", ProbeStatus::Tampered),
    ];
    let verdict = aggregator(&probes).run();
    assert_eq!(verdict.fired_labels(), vec!["delta", "bravo"]);
}
