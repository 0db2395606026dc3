//! Input classification: raw input event + current stimulus state → trial
//! outcome. Game-specific behavior is confined to the premature policy and
//! the target identity carried by the stimulus.

use crate::core::timing::InstantStamp;
use crate::trial::{Stimulus, TargetId, TrialOutcome};

/// How a game treats input that arrives while no stimulus is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrematurePolicy {
    /// Silently ignored (falling-object catch).
    Ignore,
    /// Counted as a plain miss (grid tapper: pressing a dark board).
    Miss,
    /// Counted as a premature response (go/no-go: jumping the light).
    Premature,
}

/// Result of classifying one input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// The input resolves the current trial (or, for penalized early input,
    /// spends a trial without consuming a stimulus).
    Outcome(TrialOutcome),
    /// The input is not an error, just not meaningful right now.
    Ignored,
}

/// Classify an input event against the active stimulus, if any.
///
/// `target` is `None` for input that identifies no target at all (pressing
/// the background); it can only ever match nothing.
pub fn classify(
    active: Option<&Stimulus>,
    target: Option<TargetId>,
    at: InstantStamp,
    policy: PrematurePolicy,
) -> Classification {
    match active {
        None => match policy {
            PrematurePolicy::Ignore => Classification::Ignored,
            PrematurePolicy::Miss => Classification::Outcome(TrialOutcome::Miss),
            PrematurePolicy::Premature => Classification::Outcome(TrialOutcome::Premature),
        },
        Some(stimulus) => {
            if target == Some(stimulus.target) {
                Classification::Outcome(TrialOutcome::Hit {
                    rt_ms: at.since(stimulus.onset),
                })
            } else {
                Classification::Outcome(TrialOutcome::Miss)
            }
        }
    }
}

/// A stimulus whose active window elapsed with no qualifying input.
pub fn expire() -> TrialOutcome {
    TrialOutcome::Miss
}
