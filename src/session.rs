//! Session aggregation: three game scores reduce to one averaged score and a
//! named skill tier.

use serde::{Deserialize, Serialize};

use crate::score::GameScore;

/// Number of tests in the battery. Aggregation blocks until all are in.
pub const BATTERY_LEN: usize = 3;

/// Skill classification bands over the 0–100 averaged score, checked in
/// descending order. Serialized as the display label, which is also the wire
/// format of leaderboard records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "F1 Material")]
    F1Material,
    #[serde(rename = "F2 Prospect")]
    F2Prospect,
    #[serde(rename = "Semi-Pro")]
    SemiPro,
    #[serde(rename = "Club Racer")]
    ClubRacer,
    #[serde(rename = "Casual Fan")]
    CasualFan,
}

impl Tier {
    pub fn from_average(average: u8) -> Self {
        if average >= 90 {
            Self::F1Material
        } else if average >= 75 {
            Self::F2Prospect
        } else if average >= 60 {
            Self::SemiPro
        } else if average >= 45 {
            Self::ClubRacer
        } else {
            Self::CasualFan
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::F1Material => "F1 Material",
            Self::F2Prospect => "F2 Prospect",
            Self::SemiPro => "Semi-Pro",
            Self::ClubRacer => "Club Racer",
            Self::CasualFan => "Casual Fan",
        }
    }
}

/// Outcome of a full battery, created once all three game scores exist and
/// immutable thereafter. Scores are in battery order: grid tapper, catch,
/// lights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub game_scores: [GameScore; BATTERY_LEN],
    pub average: u8,
    pub tier: Tier,
}

/// Collects per-game scores as tests finish. [`SessionAggregator::result`]
/// stays `None` until the battery is complete.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    scores: Vec<GameScore>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, score: GameScore) {
        assert!(
            self.scores.len() < BATTERY_LEN,
            "session already holds {BATTERY_LEN} scores"
        );
        self.scores.push(score);
    }

    pub fn completed(&self) -> &[GameScore] {
        &self.scores
    }

    pub fn result(&self) -> Option<SessionResult> {
        let game_scores: [GameScore; BATTERY_LEN] = self.scores.as_slice().try_into().ok()?;
        let sum: u32 = game_scores.iter().map(|s| u32::from(s.value)).sum();
        let average = (f64::from(sum) / BATTERY_LEN as f64).round() as u8;
        Some(SessionResult {
            game_scores,
            average,
            tier: Tier::from_average(average),
        })
    }

    /// Discard everything for a fresh battery.
    pub fn reset(&mut self) {
        self.scores.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(value: u8) -> GameScore {
        GameScore {
            value,
            hits: 5,
            misses: 0,
            average_reaction_ms: 300.0,
        }
    }

    #[test]
    fn aggregates_to_rounded_mean_and_tier() {
        let mut agg = SessionAggregator::new();
        agg.record(score(88));
        agg.record(score(92));
        agg.record(score(85));
        let result = agg.result().unwrap();
        // round(265 / 3) = 88, inside the [75, 90) band.
        assert_eq!(result.average, 88);
        assert_eq!(result.tier, Tier::F2Prospect);
    }

    #[test]
    fn top_band_is_f1_material() {
        let mut agg = SessionAggregator::new();
        for _ in 0..3 {
            agg.record(score(95));
        }
        let result = agg.result().unwrap();
        assert_eq!(result.average, 95);
        assert_eq!(result.tier, Tier::F1Material);
    }

    #[test]
    fn blocks_until_three_scores_exist() {
        let mut agg = SessionAggregator::new();
        assert!(agg.result().is_none());
        agg.record(score(70));
        agg.record(score(70));
        assert!(agg.result().is_none());
        agg.record(score(70));
        assert!(agg.result().is_some());
    }

    #[test]
    fn tier_band_edges() {
        assert_eq!(Tier::from_average(90), Tier::F1Material);
        assert_eq!(Tier::from_average(89), Tier::F2Prospect);
        assert_eq!(Tier::from_average(75), Tier::F2Prospect);
        assert_eq!(Tier::from_average(60), Tier::SemiPro);
        assert_eq!(Tier::from_average(45), Tier::ClubRacer);
        assert_eq!(Tier::from_average(44), Tier::CasualFan);
        assert_eq!(Tier::from_average(0), Tier::CasualFan);
    }

    #[test]
    fn tier_serializes_as_label() {
        let json = serde_json::to_string(&Tier::SemiPro).unwrap();
        assert_eq!(json, "\"Semi-Pro\"");
        let back: Tier = serde_json::from_str("\"F1 Material\"").unwrap();
        assert_eq!(back, Tier::F1Material);
    }

    #[test]
    fn reset_discards_scores() {
        let mut agg = SessionAggregator::new();
        agg.record(score(50));
        agg.reset();
        assert!(agg.completed().is_empty());
        assert!(agg.result().is_none());
    }
}
