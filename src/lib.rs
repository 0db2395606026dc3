//! Reaction-time test battery: a grid tapper, a falling-object catch and a
//! go/no-go light, run back to back, scored 0-100 and averaged into a tiered
//! session result that can be pushed to a leaderboard.

pub mod battery;
pub mod classify;
pub mod core;
pub mod leaderboard;
pub mod score;
pub mod session;
pub mod tasks;
pub mod trial;

pub use battery::{Battery, BatteryCommand, BatteryConfig, BatterySnapshot};
pub use leaderboard::{top_ten, InMemoryLeaderboard, LeaderboardGateway, ScoreRecord};
pub use score::GameScore;
pub use session::{SessionAggregator, SessionResult, Tier};
pub use tasks::{BatakMode, TaskKind};
