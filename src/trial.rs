//! Trial bookkeeping: the active stimulus, per-trial outcomes and the
//! append-only ledger a finished game is scored from.

use serde::{Deserialize, Serialize};

use crate::core::timing::InstantStamp;

/// Identifier of a target position (grid cell, ball lane). Single-target
/// games use index 0 throughout.
pub type TargetId = usize;

/// One activation of a target, alive from onset until an input or window
/// expiry resolves it into a [`TrialOutcome`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stimulus {
    pub target: TargetId,
    pub onset: InstantStamp,
    /// If set, the stimulus auto-resolves as a miss once this many
    /// milliseconds pass unanswered. Catch-style games leave it unset and
    /// wait for input.
    pub active_window_ms: Option<u64>,
}

/// Result of one trial. Exactly one outcome exists per trial index and
/// outcomes are never revised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrialOutcome {
    Hit { rt_ms: f64 },
    Miss,
    Premature,
}

impl TrialOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

/// Ordered, append-only record of outcomes for one game instance.
///
/// Bounded ledgers complete at a fixed trial count; unbounded ledgers (the
/// grid tapper, whose run is clock-limited) complete only via
/// [`TrialLedger::terminate`]. Appending past completion is a protocol
/// violation between scheduler and classifier, treated as a fatal logic
/// error rather than a recoverable condition.
#[derive(Debug, Clone, Default)]
pub struct TrialLedger {
    outcomes: Vec<TrialOutcome>,
    capacity: Option<usize>,
    terminated: bool,
}

impl TrialLedger {
    /// Ledger completing after exactly `trials` outcomes.
    pub fn bounded(trials: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(trials),
            capacity: Some(trials),
            terminated: false,
        }
    }

    /// Ledger with no trial-count bound; completion is decided externally.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn append(&mut self, outcome: TrialOutcome) {
        assert!(
            !self.is_complete(),
            "trial ledger overflow: append after completion"
        );
        self.outcomes.push(outcome);
    }

    /// Freeze the ledger as-is (Sudden Death, or the run clock expiring).
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_complete(&self) -> bool {
        self.terminated || self.capacity.is_some_and(|cap| self.outcomes.len() >= cap)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[TrialOutcome] {
        &self.outcomes
    }

    pub fn hits(&self) -> u32 {
        self.outcomes.iter().filter(|o| o.is_hit()).count() as u32
    }

    pub fn misses(&self) -> u32 {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TrialOutcome::Miss))
            .count() as u32
    }

    pub fn prematures(&self) -> u32 {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TrialOutcome::Premature))
            .count() as u32
    }

    /// Reaction times of hit trials, preserving trial order.
    pub fn reaction_times(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                TrialOutcome::Hit { rt_ms } => Some(*rt_ms),
                _ => None,
            })
            .collect()
    }
}
