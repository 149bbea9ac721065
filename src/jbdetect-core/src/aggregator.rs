//! Parallel probe execution and the any-positive reduction.
//!
//! ## Execution
//!
//! Every probe runs on its own short-lived thread and reports back over a
//! channel. The aggregator waits until all probes have answered or the
//! per-probe deadline passes; late probes count as `Inconclusive`.
//!
//! Probes that declare [`Probe::runs_inline`] run on the calling thread
//! instead, after the other probes have been started. The same deadline
//! applies to their results.
//!
//! Probes that declare a scoped side effect are joined before
//! [`Aggregator::run`] returns, even past the deadline, so their cleanup
//! happens-before the verdict is published. The join gives up after
//! [`SCOPED_JOIN_FACTOR`] times the probe timeout; a probe still running by
//! then is detached and logged. Other late probes are detached at the
//! deadline; their eventual result is discarded.
//!
//! ## Reduction
//!
//! [`reduce`] is a pure function of the per-probe results: the verdict is
//! tampered iff any result is `Tampered`. It does not depend on the order in
//! which results arrived.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::probe::{Probe, ProbeRegistry, Weight};
use crate::types::{current_timestamp, ProbeResult, Verdict};

/// Scoped probes are joined for at most this many probe timeouts.
pub const SCOPED_JOIN_FACTOR: u32 = 4;

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Runs a probe registry and reduces the results.
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: ProbeRegistry,
    probe_timeout: Duration,
}

impl Aggregator {
    /// Create an aggregator over `registry` with a per-probe deadline.
    pub fn new(registry: ProbeRegistry, probe_timeout: Duration) -> Self {
        Self {
            registry,
            probe_timeout,
        }
    }

    /// The registry this aggregator runs.
    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Per-probe deadline.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Run every probe and reduce to a verdict.
    pub fn run(&self) -> Verdict {
        let start = Instant::now();
        let results = self.collect();
        let verdict = reduce(results);

        info!(
            tampered = verdict.is_tampered,
            fired = ?verdict.fired_labels(),
            probes_run = verdict.probes_run,
            inconclusive = verdict.inconclusive,
            confidence = verdict.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Verdict computed"
        );
        verdict
    }

    /// Run all probes concurrently; results come back in registry order.
    fn collect(&self) -> Vec<(ProbeResult, Weight)> {
        let probes = self.registry.probes();
        let mut slots: Vec<Option<ProbeResult>> = vec![None; probes.len()];
        let mut scoped: Vec<(usize, JoinHandle<()>)> = Vec::new();
        let mut inline: Vec<usize> = Vec::new();
        let (tx, rx) = mpsc::channel::<(usize, ProbeResult)>();

        let started = Instant::now();
        for (index, probe) in probes.iter().enumerate() {
            if probe.runs_inline() {
                inline.push(index);
                continue;
            }
            match spawn_probe(index, Arc::clone(probe), tx.clone()) {
                Ok(handle) if probe.has_scoped_side_effect() => scoped.push((index, handle)),
                Ok(_detached) => {},
                Err(e) => slots[index] = Some(ProbeResult::inconclusive_from(probe.label(), &e)),
            }
        }
        drop(tx);

        let deadline = started + self.probe_timeout;
        for index in inline {
            let probe = probes[index].as_ref();
            let result = execute(probe);
            if Instant::now() <= deadline {
                slots[index] = Some(result);
            }
        }

        let mut pending = slots.iter().filter(|s| s.is_none()).count();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((index, result)) => {
                    if slots[index].is_none() {
                        pending -= 1;
                    }
                    slots[index] = Some(result);
                },
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        // Cleanup of scoped side effects must finish before we publish
        let join_deadline = started + self.probe_timeout * SCOPED_JOIN_FACTOR;
        for (index, handle) in scoped {
            join_until(probes[index].label(), handle, join_deadline);
        }

        let timeout_ms = self.probe_timeout.as_millis() as u64;
        probes
            .iter()
            .zip(slots)
            .map(|(probe, slot)| {
                let result = slot.unwrap_or_else(|| {
                    warn!(probe = probe.label(), timeout_ms, "Probe missed its deadline");
                    let err = ProbeError::Timeout {
                        elapsed_ms: timeout_ms,
                    };
                    ProbeResult::inconclusive_from(probe.label(), &err)
                });
                debug!(
                    probe = %result.label,
                    status = ?result.status,
                    detail = result.detail.as_deref().unwrap_or(""),
                    elapsed_us = result.elapsed_us,
                    "Probe finished"
                );
                (result, probe.weight())
            })
            .collect()
    }
}

/// Join `handle` unless it is still running at `deadline`.
fn join_until(label: &str, handle: JoinHandle<()>, deadline: Instant) {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                probe = label,
                "Scoped probe still running at join cap; detaching before cleanup"
            );
            return;
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    if handle.join().is_err() {
        warn!(probe = label, "Scoped probe thread panicked");
    }
}

/// Run a probe on the current thread, containing panics.
fn execute(probe: &dyn Probe) -> ProbeResult {
    let start = Instant::now();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| probe.run())) {
        Ok(result) => result,
        Err(_) => {
            warn!(probe = probe.label(), "Probe panicked");
            ProbeResult::inconclusive_from(probe.label(), &ProbeError::Panicked)
        },
    };
    result.with_elapsed(start.elapsed())
}

/// Run one probe on a named thread.
fn spawn_probe(
    index: usize,
    probe: Arc<dyn Probe>,
    tx: mpsc::Sender<(usize, ProbeResult)>,
) -> Result<JoinHandle<()>, ProbeError> {
    let handle = thread::Builder::new()
        .name(format!("jbdetect-{}", probe.label()))
        .spawn(move || {
            let result = execute(probe.as_ref());
            // The receiver is gone if we missed the deadline
            let _ = tx.send((index, result));
        })?;
    Ok(handle)
}

/// Reduce per-probe results to a verdict (any-positive).
///
/// `fired` keeps the input order. Confidence for a tampered verdict is
/// `1 - Π(1 - wᵢ)` over the fired probes' weights; for a clean verdict it
/// is the fraction of probes that reached a conclusive answer.
pub fn reduce(results: Vec<(ProbeResult, Weight)>) -> Verdict {
    let probes_run = results.len();
    let inconclusive = results
        .iter()
        .filter(|(r, _)| !r.status.is_conclusive())
        .count();

    let mut miss_probability = 1.0_f64;
    let mut fired = Vec::new();
    for (result, weight) in results {
        if result.is_tampered() {
            miss_probability *= 1.0 - weight.value();
            fired.push(result);
        }
    }

    let is_tampered = !fired.is_empty();
    let confidence = if is_tampered {
        1.0 - miss_probability
    } else if probes_run == 0 {
        0.0
    } else {
        (probes_run - inconclusive) as f64 / probes_run as f64
    };

    Verdict {
        is_tampered,
        fired,
        computed_at: current_timestamp(),
        probes_run,
        inconclusive,
        confidence,
    }
}
