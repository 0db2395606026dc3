//! Leaderboard gateway: append-only writes of completed sessions and a
//! subscription that replays the full record set on every change.
//!
//! The gateway is the one true async I/O boundary in the crate. Scoring never
//! waits on it — a failed write degrades to a notice, the session result
//! stays valid.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::session::{SessionResult, Tier};

fn anonymous() -> String {
    "Anonymous".to_string()
}

/// One persisted session. Field names are the wire format of the remote
/// score list (`batak`/`tennis`/`lights` per-game values, `category` as the
/// tier label, `timestamp` in epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: String,
    #[serde(default = "anonymous")]
    pub name: String,
    pub average: u8,
    pub category: Tier,
    pub batak: u8,
    pub tennis: u8,
    pub lights: u8,
    pub timestamp: i64,
}

impl ScoreRecord {
    /// Build a record from a finished session. A blank or missing name
    /// submits as "Anonymous".
    pub fn from_session(result: &SessionResult, name: Option<&str>) -> Self {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(anonymous, str::to_string);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            average: result.average,
            category: result.tier,
            batak: result.game_scores[0].value,
            tennis: result.game_scores[1].value,
            lights: result.game_scores[2].value,
            timestamp: epoch_ms(),
        }
    }
}

fn epoch_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("leaderboard write failed: {0}")]
    Write(String),
}

/// Remote score store seen as a write-append / read-subscribe interface.
#[async_trait]
pub trait LeaderboardGateway: Send + Sync {
    async fn append(&self, record: ScoreRecord) -> Result<(), LeaderboardError>;

    /// Receiver holding the full current record set; updated on every change.
    fn subscribe(&self) -> watch::Receiver<Vec<ScoreRecord>>;
}

/// Reference gateway backed by process memory. Stands in for the remote
/// store in tests and offline runs.
#[derive(Debug)]
pub struct InMemoryLeaderboard {
    records: Mutex<Vec<ScoreRecord>>,
    tx: watch::Sender<Vec<ScoreRecord>>,
}

impl InMemoryLeaderboard {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(Vec::new());
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            tx,
        })
    }
}

#[async_trait]
impl LeaderboardGateway for InMemoryLeaderboard {
    async fn append(&self, record: ScoreRecord) -> Result<(), LeaderboardError> {
        let snapshot = {
            let mut records = self
                .records
                .lock()
                .map_err(|_| LeaderboardError::Write("store poisoned".into()))?;
            records.push(record);
            records.clone()
        };
        let _ = self.tx.send(snapshot);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<ScoreRecord>> {
        self.tx.subscribe()
    }
}

/// Read-side filter over the subscription stream: best ten records by
/// average, descending.
pub fn top_ten(records: &[ScoreRecord]) -> Vec<ScoreRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.average.cmp(&a.average).then(a.timestamp.cmp(&b.timestamp)));
    sorted.truncate(10);
    sorted
}
