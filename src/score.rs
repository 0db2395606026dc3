//! Score reduction: a completed trial ledger collapses into a single 0–100
//! game score. Two formulas coexist — the catch and lights tests weigh
//! accuracy against measured reaction speed, while the grid tapper scores
//! against its fixed time budget. They encode different design intents and
//! are kept as separate strategies.

use serde::{Deserialize, Serialize};

use crate::trial::TrialLedger;

/// Ceiling applied to average reaction time in the accuracy+speed formula;
/// also the value substituted when a run produced no hits at all.
pub const MAX_LIGHT_TIME_MS: f64 = 1000.0;

/// Reaction-time budget per attempt, in seconds, for the time-budget formula.
pub const MAX_REACTION_TIME_S: f64 = 2.5;

/// Final score for one game, produced exactly once per completed ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameScore {
    /// 0–100, higher is better.
    pub value: u8,
    pub hits: u32,
    /// Misses and prematures combined.
    pub misses: u32,
    /// The average reaction the formula scored against: mean hit reaction
    /// time for accuracy+speed, the budget-derived approximation for
    /// time-budget.
    pub average_reaction_ms: f64,
}

/// Accuracy+speed reduction (catch and lights tests).
///
/// `accuracy * 65 + 35 * (1 - min(avg, MAX) / MAX)`, where accuracy defaults
/// to 1 when no attempts were made and the average substitutes
/// [`MAX_LIGHT_TIME_MS`] when there are no hits. The arithmetic already keeps
/// the result inside [0, 100]; the clamp is a backstop, not a correction.
pub fn accuracy_speed(ledger: &TrialLedger) -> GameScore {
    let hits = ledger.hits();
    let misses = ledger.misses() + ledger.prematures();
    let attempts = hits + misses;

    let accuracy = if attempts == 0 {
        1.0
    } else {
        f64::from(hits) / f64::from(attempts)
    };

    let times = ledger.reaction_times();
    let average_reaction_ms = if times.is_empty() {
        MAX_LIGHT_TIME_MS
    } else {
        times.iter().sum::<f64>() / times.len() as f64
    };

    let speed_term = 1.0 - average_reaction_ms.min(MAX_LIGHT_TIME_MS) / MAX_LIGHT_TIME_MS;
    let score = accuracy * 65.0 + 35.0 * speed_term;

    GameScore {
        value: score.round().clamp(0.0, 100.0) as u8,
        hits,
        misses,
        average_reaction_ms,
    }
}

/// Time-budget reduction (grid tapper).
///
/// Approximates reaction speed as `total_duration_s / attempts` against a
/// 2.5 s budget rather than averaging the captured per-trial reaction times;
/// kept that way for parity with historical scores. The speed term can go
/// negative when attempts are sparse, so the rounded result floors at zero.
pub fn time_budget(ledger: &TrialLedger, total_duration_s: f64) -> GameScore {
    let hits = ledger.hits();
    let misses = ledger.misses() + ledger.prematures();
    let attempts = hits + misses;

    let accuracy = if attempts == 0 {
        1.0
    } else {
        f64::from(hits) / f64::from(attempts)
    };

    let avg_reaction_s = total_duration_s / f64::from(attempts.max(1));
    let raw = accuracy * 70.0 + 30.0 * (1.0 - avg_reaction_s / MAX_REACTION_TIME_S);

    GameScore {
        value: raw.round().clamp(0.0, 100.0) as u8,
        hits,
        misses,
        average_reaction_ms: avg_reaction_s * 1000.0,
    }
}
