//! End-to-end battery runs against the public API, with tokio's paused clock
//! driving the timers.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::timeout;

use gridline::battery::{Battery, BatteryConfig, BatterySnapshot};
use gridline::leaderboard::{InMemoryLeaderboard, LeaderboardError, LeaderboardGateway, ScoreRecord};
use gridline::session::SessionResult;
use gridline::tasks::{BatakConfig, CatchConfig, LightsConfig};

fn short_config() -> BatteryConfig {
    BatteryConfig {
        batak: BatakConfig {
            total_time_s: 3,
            ..BatakConfig::default()
        },
        catch: CatchConfig {
            trials: 2,
            ..CatchConfig::default()
        },
        lights: LightsConfig {
            trials: 2,
            ..LightsConfig::default()
        },
    }
}

/// Press every stimulus on its reported target until the session resolves.
async fn play_to_result(
    battery: &Battery,
    snaps: &mut watch::Receiver<BatterySnapshot>,
) -> SessionResult {
    let played = async {
        loop {
            snaps.changed().await.expect("driver alive");
            let snap = snaps.borrow_and_update().clone();
            if let Some(result) = snap.result {
                return result;
            }
            if snap.stimulus.stimulus_active {
                battery.press(snap.stimulus.target);
            }
        }
    };
    timeout(Duration::from_secs(600), played)
        .await
        .expect("battery should finish")
}

#[tokio::test(start_paused = true)]
async fn full_battery_produces_a_tiered_result() {
    let battery = Battery::spawn(short_config(), None);
    let mut snaps = battery.snapshots();
    battery.start();

    let result = play_to_result(&battery, &mut snaps).await;

    // Every press lands within the paused clock's real-time jitter, so the
    // catch and go/no-go tests sit near the top of the scale.
    assert!(result.game_scores[1].value >= 95);
    assert!(result.game_scores[2].value >= 95);
    assert_eq!(result.game_scores[1].misses, 0);
    assert_eq!(result.game_scores[2].misses, 0);
    // The grid tapper is clock-limited; three seconds leaves room for at
    // least two lit cells, all of them hit.
    assert!(result.game_scores[0].hits >= 2);
    assert_eq!(result.game_scores[0].misses, 0);
    assert!(result.game_scores[0].value >= 70);

    let mean = result.game_scores.iter().map(|s| s.value as u32).sum::<u32>() as f64 / 3.0;
    assert_eq!(result.average, mean.round() as u8);

    let snap = snaps.borrow().clone();
    assert_eq!(snap.completed.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn submitting_a_finished_session_reaches_the_leaderboard() {
    let board = InMemoryLeaderboard::new();
    let battery = Battery::spawn(short_config(), Some(board.clone()));
    let mut snaps = battery.snapshots();
    battery.start();

    let result = play_to_result(&battery, &mut snaps).await;

    let mut records = board.subscribe();
    battery.submit(Some("  Niki  ".to_string()));
    timeout(Duration::from_secs(5), records.changed())
        .await
        .expect("submission should land")
        .unwrap();

    let stored = records.borrow().clone();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Niki");
    assert_eq!(stored[0].average, result.average);
    assert_eq!(stored[0].category, result.tier);
    assert_eq!(stored[0].batak, result.game_scores[0].value);
    assert_eq!(stored[0].tennis, result.game_scores[1].value);
    assert_eq!(stored[0].lights, result.game_scores[2].value);
}

#[tokio::test(start_paused = true)]
async fn abort_discards_the_session() {
    let battery = Battery::spawn(short_config(), None);
    let mut snaps = battery.snapshots();
    battery.start();

    // Let the countdown begin, then walk away.
    snaps.changed().await.unwrap();
    battery.abort();

    let aborted = async {
        loop {
            snaps.changed().await.unwrap();
            let snap = snaps.borrow_and_update().clone();
            if snap.countdown.is_none() && !snap.stimulus.stimulus_active {
                return snap;
            }
        }
    };
    let snap = timeout(Duration::from_secs(60), aborted)
        .await
        .expect("abort should settle");
    assert!(snap.completed.is_empty());
    assert!(snap.result.is_none());

    // A fresh start after an abort plays through cleanly.
    battery.start();
    let result = play_to_result(&battery, &mut snaps).await;
    assert_eq!(result.game_scores.len(), 3);
}

struct RejectingBoard;

#[async_trait]
impl LeaderboardGateway for RejectingBoard {
    async fn append(&self, _record: ScoreRecord) -> Result<(), LeaderboardError> {
        Err(LeaderboardError::Write("store offline".into()))
    }

    fn subscribe(&self) -> watch::Receiver<Vec<ScoreRecord>> {
        let (tx, rx) = watch::channel(Vec::new());
        drop(tx);
        rx
    }
}

#[tokio::test(start_paused = true)]
async fn failed_submission_surfaces_as_a_notice() {
    let battery = Battery::spawn(short_config(), Some(std::sync::Arc::new(RejectingBoard)));
    let mut snaps = battery.snapshots();
    battery.start();

    let result = play_to_result(&battery, &mut snaps).await;
    assert!(result.average <= 100);

    battery.submit(None);
    let noticed = async {
        loop {
            snaps.changed().await.unwrap();
            if let Some(notice) = snaps.borrow_and_update().notice.clone() {
                return notice;
            }
        }
    };
    let notice = timeout(Duration::from_secs(5), noticed)
        .await
        .expect("write failure should surface");
    assert!(notice.contains("could not be saved"));
}
