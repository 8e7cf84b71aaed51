//! The sampling control loop.
//!
//! ```text
//! loop {
//!     matrix  = source.next_matrix()      // blocks
//!     actions = decoder.decode(matrix)    // diff vs. occupancy
//!     for action in actions {
//!         runtime.perform_action(action)  // table lookup
//!         sink.on_transition(..)          // on success
//!         sleep(settle)
//!     }
//! }
//! ```
//!
//! The loop is synchronous. A shared cancellation flag is checked before each
//! sample and before each queued action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use modbot_core::Action;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decoder::{ConnectivityMatrix, MatrixDecoder};
use crate::error::AutomatonResult;
use crate::runtime::{AutomatonRuntime, RuntimeStats, StepOutcome};
use crate::sink::TopologySink;
use crate::source::MatrixSource;

/// What happened while processing one sample.
#[derive(Debug, Clone)]
pub struct SampleReport {
    /// Sample number (0-indexed).
    pub sample: u64,

    /// Actions decoded from the sample, in order.
    pub actions: Vec<Action>,

    /// Outcome of each action that was performed.
    pub outcomes: Vec<StepOutcome>,

    /// The loop was cancelled before every action was performed.
    pub cancelled: bool,

    pub duration: Duration,
}

impl SampleReport {
    /// Number of actions that moved the runtime.
    pub fn transitions(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_transition()).count()
    }

    /// Number of actions without a transition.
    pub fn misses(&self) -> usize {
        self.outcomes.len() - self.transitions()
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopSummary {
    pub samples: u64,
    pub actions: u64,
    pub stats: RuntimeStats,
    pub cancelled: bool,
}

/// Drives the runtime from a matrix source.
pub struct ControlLoop<S, K> {
    runtime: AutomatonRuntime,
    decoder: MatrixDecoder,
    source: S,
    sink: K,
    settle: Duration,
    cancelled: Arc<AtomicBool>,
    samples: u64,
}

impl<S: MatrixSource, K: TopologySink> ControlLoop<S, K> {
    /// Create a loop with no settle delay and a fresh decoder.
    pub fn new(runtime: AutomatonRuntime, source: S, sink: K) -> Self {
        Self {
            runtime,
            decoder: MatrixDecoder::new(),
            source,
            sink,
            settle: Duration::ZERO,
            cancelled: Arc::new(AtomicBool::new(false)),
            samples: 0,
        }
    }

    /// Pause after each performed action.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Share an external cancellation flag.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Flag that stops the loop when set to `true`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn runtime(&self) -> &AutomatonRuntime {
        &self.runtime
    }

    pub fn decoder(&self) -> &MatrixDecoder {
        &self.decoder
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Number of samples processed so far.
    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// Give back the runtime (e.g. to persist its state).
    pub fn into_runtime(self) -> AutomatonRuntime {
        self.runtime
    }

    /// Decode one sample and perform its actions in order.
    pub fn process(&mut self, matrix: &ConnectivityMatrix) -> AutomatonResult<SampleReport> {
        let started = Instant::now();
        let sample = self.samples;
        self.samples += 1;

        let actions = self.decoder.decode(matrix);
        debug!(sample, actions = actions.len(), "sample_decoded");

        let mut outcomes = Vec::with_capacity(actions.len());
        let mut cancelled = false;

        for action in &actions {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = self.runtime.perform_action(action)?;
            if let StepOutcome::Transitioned { from, to, .. } = outcome {
                if let (Some(before), Some(after)) =
                    (self.runtime.topology(from), self.runtime.topology(to))
                {
                    self.sink.on_transition(action, before, after);
                }
            }
            outcomes.push(outcome);

            if !self.settle.is_zero() {
                thread::sleep(self.settle);
            }
        }

        let report = SampleReport {
            sample,
            actions,
            outcomes,
            cancelled,
            duration: started.elapsed(),
        };

        debug!(
            sample,
            transitions = report.transitions(),
            misses = report.misses(),
            duration_ms = report.duration.as_millis() as u64,
            "sample_complete"
        );
        Ok(report)
    }

    /// Pull and process one sample. `Ok(None)` when the source is exhausted
    /// or the loop was cancelled before pulling.
    pub fn step(&mut self) -> AutomatonResult<Option<SampleReport>> {
        if self.is_cancelled() {
            return Ok(None);
        }
        match self.source.next_matrix()? {
            Some(matrix) => self.process(&matrix).map(Some),
            None => Ok(None),
        }
    }

    /// Run until the source ends or the loop is cancelled.
    pub fn run(&mut self) -> AutomatonResult<LoopSummary> {
        info!(settle_ms = self.settle.as_millis() as u64, "control_loop_start");

        let mut summary = LoopSummary::default();
        while let Some(report) = self.step()? {
            summary.samples += 1;
            summary.actions += report.outcomes.len() as u64;
            if report.cancelled {
                break;
            }
        }
        summary.cancelled = self.is_cancelled();
        summary.stats = self.runtime.stats().clone();

        info!(
            samples = summary.samples,
            actions = summary.actions,
            cancelled = summary.cancelled,
            "control_loop_complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutomatonConfig;
    use crate::source::ReplaySource;
    use crate::table::TransitionTable;
    use modbot_core::Topology;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(Action, Topology)>,
    }

    impl TopologySink for Recorder {
        fn on_transition(&mut self, action: &Action, _from: &Topology, to: &Topology) {
            self.seen.push((*action, to.clone()));
        }
    }

    fn runtime(units: u8) -> AutomatonRuntime {
        let config = AutomatonConfig {
            parallel: false,
            ..AutomatonConfig::with_units(units)
        };
        AutomatonRuntime::new(Arc::new(TransitionTable::build(&config).unwrap()))
    }

    fn matrix(rows: &[&[u8]]) -> ConnectivityMatrix {
        ConnectivityMatrix::new(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_sink_sees_only_transitions() {
        // M1 P1 holds M2 P4 (2 << 3 | 4 = 20).
        let source = ReplaySource::new([matrix(&[&[20, 0, 0], &[0, 0, 0]])]);
        let mut control = ControlLoop::new(runtime(2), source, Recorder::default());

        let summary = control.run().unwrap();
        assert_eq!(summary.samples, 1);
        assert_eq!(summary.actions, 1);
        assert_eq!(control.sink().seen.len(), 1);
        assert_eq!(control.runtime().current_topology().unwrap().len(), 1);
    }

    #[test]
    fn test_connect_then_disconnect_over_samples() {
        let source = ReplaySource::new([
            matrix(&[&[20, 0, 0], &[0, 0, 0]]),
            matrix(&[&[20, 0, 0], &[0, 0, 0]]),
            matrix(&[&[0, 0, 0], &[0, 0, 0]]),
        ]);
        let mut control = ControlLoop::new(runtime(2), source, ());

        let summary = control.run().unwrap();
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.actions, 2);
        assert_eq!(summary.stats.transitioned, 2);
        assert!(control.runtime().current_topology().unwrap().is_empty());
    }

    #[test]
    fn test_misses_do_not_stop_the_loop() {
        let source = ReplaySource::new([matrix(&[&[1, 0, 0], &[0, 12, 0], &[0, 0, 28]])]);
        let mut control = ControlLoop::new(runtime(3), source, Recorder::default());

        let report = control.step().unwrap().unwrap();
        assert_eq!(report.actions.len(), 3);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.transitions(), 1);
        assert!(matches!(report.outcomes[1], StepOutcome::Unknown { .. }));
        assert!(matches!(report.outcomes[2], StepOutcome::Forbidden { .. }));
        assert!(control.step().unwrap().is_none());
    }

    #[test]
    fn test_cancel_stops_before_next_action() {
        let source = ReplaySource::new([matrix(&[&[20, 0, 0], &[0, 0, 0]])]);
        let mut control = ControlLoop::new(runtime(2), source, ());
        control.cancel_flag().store(true, Ordering::SeqCst);

        let summary = control.run().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.samples, 0);
        assert!(control.runtime().current_topology().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_mid_sample() {
        let mut control = ControlLoop::new(runtime(2), ReplaySource::default(), ());
        let flag = control.cancel_flag();
        flag.store(true, Ordering::SeqCst);

        let report = control.process(&matrix(&[&[20, 0, 0], &[0, 0, 0]])).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.actions.len(), 1);
        assert!(report.outcomes.is_empty());
    }
}
