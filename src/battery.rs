//! Battery driver: runs the three tests in fixed order, feeds completed
//! scores into the session aggregator and publishes observable state for a
//! presentation layer.
//!
//! All engine work happens on one event stream. External commands and timer
//! callbacks land in the same channel, so trial progression is strictly
//! sequential; timers are spawned sleeps that post back the `run_id` they
//! were armed under and go stale harmlessly after an abort or restart.
//! Leaderboard submission is fire-and-forget: a failed write becomes a
//! notice on the snapshot, never an invalidated score.

use std::sync::Arc;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::timing;
use crate::leaderboard::{LeaderboardGateway, ScoreRecord};
use crate::score::GameScore;
use crate::session::{SessionAggregator, SessionResult, BATTERY_LEN};
use crate::tasks::{
    ArmOutcome, BatakConfig, BatakEngine, CatchConfig, CatchEngine, CountdownStep, LightsConfig,
    LightsEngine, ResponseOutcome, StimulusView, TaskEngine, TaskKind,
};
use crate::trial::TargetId;

/// Per-task configuration for one battery.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryConfig {
    pub batak: BatakConfig,
    pub catch: CatchConfig,
    pub lights: LightsConfig,
}

/// Commands a front end sends into a running battery.
#[derive(Debug, Clone)]
pub enum BatteryCommand {
    /// Begin the battery, or restart it from scratch once finished.
    Start,
    /// Raw input event; `target` identifies the pressed cell or lane.
    Press { target: Option<TargetId> },
    Abort,
    /// Push the finished session to the leaderboard gateway.
    Submit { name: Option<String> },
}

/// Timer events carry the task index they were armed for as well as the
/// engine run id: run ids are per-engine counters, so without the task tag a
/// leftover timer from one engine could alias a fresh run of another.
#[derive(Debug)]
enum BatteryEvent {
    Command(BatteryCommand),
    CountdownTick { task: usize, run_id: u64 },
    StimulusReady { task: usize, run_id: u64, trial_index: usize },
    WindowExpired { task: usize, run_id: u64, trial_index: usize },
    CooldownOver { task: usize, run_id: u64, trial_index: usize },
    TimeUp { task: usize, run_id: u64 },
    SubmitFailed { message: String },
}

/// Observable battery state, published on every change.
#[derive(Debug, Clone, Default)]
pub struct BatterySnapshot {
    pub task: Option<TaskKind>,
    /// Countdown step currently displayed, when in the pre-run countdown.
    pub countdown: Option<u8>,
    pub stimulus: StimulusView,
    /// Scores of tests finished so far this session, in battery order.
    pub completed: Vec<GameScore>,
    pub result: Option<SessionResult>,
    /// Non-blocking notice, currently only leaderboard write failures.
    pub notice: Option<String>,
}

/// Handle to a spawned battery. Dropping it detaches the driver; it winds
/// down once the command channel closes.
#[derive(Debug)]
pub struct Battery {
    tx: UnboundedSender<BatteryEvent>,
    snapshots: watch::Receiver<BatterySnapshot>,
}

impl Battery {
    /// Spawn a battery driver onto the current tokio runtime.
    pub fn spawn(config: BatteryConfig, gateway: Option<Arc<dyn LeaderboardGateway>>) -> Self {
        let engines: [Box<dyn TaskEngine>; BATTERY_LEN] = [
            Box::new(BatakEngine::new(config.batak)),
            Box::new(CatchEngine::new(config.catch)),
            Box::new(LightsEngine::new(config.lights)),
        ];
        Self::spawn_with_engines(engines, gateway)
    }

    /// Spawn with pre-built engines (tests inject deterministic sources).
    pub fn spawn_with_engines(
        engines: [Box<dyn TaskEngine>; BATTERY_LEN],
        gateway: Option<Arc<dyn LeaderboardGateway>>,
    ) -> Self {
        let (tx, rx) = unbounded();
        let (snap_tx, snap_rx) = watch::channel(BatterySnapshot::default());
        let driver = Driver {
            engines,
            current: 0,
            aggregator: SessionAggregator::new(),
            gateway,
            tx: tx.clone(),
            snap_tx,
            countdown: None,
            notice: None,
            running: false,
        };
        tokio::spawn(driver.run(rx));
        Self {
            tx,
            snapshots: snap_rx,
        }
    }

    pub fn start(&self) {
        self.send(BatteryCommand::Start);
    }

    pub fn press(&self, target: Option<TargetId>) {
        self.send(BatteryCommand::Press { target });
    }

    pub fn abort(&self) {
        self.send(BatteryCommand::Abort);
    }

    pub fn submit(&self, name: Option<String>) {
        self.send(BatteryCommand::Submit { name });
    }

    pub fn snapshots(&self) -> watch::Receiver<BatterySnapshot> {
        self.snapshots.clone()
    }

    fn send(&self, command: BatteryCommand) {
        let _ = self.tx.unbounded_send(BatteryEvent::Command(command));
    }
}

struct Driver {
    engines: [Box<dyn TaskEngine>; BATTERY_LEN],
    current: usize,
    aggregator: SessionAggregator,
    gateway: Option<Arc<dyn LeaderboardGateway>>,
    tx: UnboundedSender<BatteryEvent>,
    snap_tx: watch::Sender<BatterySnapshot>,
    countdown: Option<u8>,
    notice: Option<String>,
    running: bool,
}

impl Driver {
    async fn run(mut self, mut rx: UnboundedReceiver<BatteryEvent>) {
        while let Some(event) = rx.next().await {
            match event {
                BatteryEvent::Command(command) => self.handle_command(command),
                BatteryEvent::CountdownTick { task, run_id } if task == self.current => {
                    self.handle_countdown(run_id)
                }
                BatteryEvent::StimulusReady { task, run_id, trial_index }
                    if task == self.current =>
                {
                    self.handle_stimulus_ready(run_id, trial_index)
                }
                BatteryEvent::WindowExpired { task, run_id, trial_index }
                    if task == self.current =>
                {
                    let outcome = self.engine_mut().register_window_expiry(run_id, trial_index);
                    self.handle_outcome(outcome);
                }
                BatteryEvent::CooldownOver { task, run_id, trial_index }
                    if task == self.current =>
                {
                    let outcome = self.engine_mut().finish_cooldown(run_id, trial_index);
                    self.handle_outcome(outcome);
                }
                BatteryEvent::TimeUp { task, run_id } if task == self.current => {
                    let outcome = self.engine_mut().register_time_up(run_id);
                    self.handle_outcome(outcome);
                }
                BatteryEvent::SubmitFailed { message } => {
                    self.notice = Some(message);
                    self.publish();
                }
                // Timer armed for a task that is no longer current.
                _ => {}
            }
        }
    }

    fn engine_mut(&mut self) -> &mut dyn TaskEngine {
        self.engines[self.current.min(BATTERY_LEN - 1)].as_mut()
    }

    fn handle_command(&mut self, command: BatteryCommand) {
        match command {
            BatteryCommand::Start => {
                if self.running {
                    debug!("start ignored: battery already running");
                    return;
                }
                // Restarting discards every trial of the previous session.
                self.aggregator.reset();
                self.notice = None;
                self.current = 0;
                self.begin_current_task();
            }
            BatteryCommand::Press { target } => {
                let now = timing::now();
                let outcome = self.engine_mut().register_press(target, now);
                self.handle_outcome(outcome);
            }
            BatteryCommand::Abort => {
                self.engine_mut().abort();
                self.aggregator.reset();
                self.current = 0;
                self.countdown = None;
                self.running = false;
                self.publish();
            }
            BatteryCommand::Submit { name } => self.handle_submit(name),
        }
    }

    fn begin_current_task(&mut self) {
        let Some(schedule) = self.engine_mut().start() else {
            debug!("start refused: run already in progress");
            return;
        };
        self.running = true;
        self.countdown = Some(schedule.remaining);
        self.queue_after(
            schedule.wait_ms,
            BatteryEvent::CountdownTick {
                task: self.current,
                run_id: schedule.run_id,
            },
        );
        self.publish();
    }

    fn handle_countdown(&mut self, run_id: u64) {
        match self.engine_mut().tick_countdown(run_id) {
            CountdownStep::Tick(tick) => {
                self.countdown = Some(tick.remaining);
                self.queue_after(
                    tick.wait_ms,
                    BatteryEvent::CountdownTick {
                        task: self.current,
                        run_id: tick.run_id,
                    },
                );
                self.publish();
            }
            CountdownStep::Go { first, run_timer_ms } => {
                self.countdown = None;
                if let Some(ms) = run_timer_ms {
                    self.queue_after(
                        ms,
                        BatteryEvent::TimeUp {
                            task: self.current,
                            run_id: first.run_id,
                        },
                    );
                }
                self.queue_after(
                    first.wait_ms,
                    BatteryEvent::StimulusReady {
                        task: self.current,
                        run_id: first.run_id,
                        trial_index: first.trial_index,
                    },
                );
                self.publish();
            }
            CountdownStep::Stale => {}
        }
    }

    fn handle_stimulus_ready(&mut self, run_id: u64, trial_index: usize) {
        let now = timing::now();
        match self.engine_mut().mark_stimulus_on(run_id, trial_index, now) {
            ArmOutcome::Active { window_ms } => {
                if let Some(window) = window_ms {
                    self.queue_after(
                        window,
                        BatteryEvent::WindowExpired {
                            task: self.current,
                            run_id,
                            trial_index,
                        },
                    );
                }
                self.publish();
            }
            ArmOutcome::Stale => {}
        }
    }

    fn handle_outcome(&mut self, outcome: ResponseOutcome) {
        match outcome {
            ResponseOutcome::NextScheduled(next) => {
                self.queue_after(
                    next.wait_ms,
                    BatteryEvent::StimulusReady {
                        task: self.current,
                        run_id: next.run_id,
                        trial_index: next.trial_index,
                    },
                );
                self.publish();
            }
            ResponseOutcome::CooldownScheduled(cooldown) => {
                self.queue_after(
                    cooldown.wait_ms,
                    BatteryEvent::CooldownOver {
                        task: self.current,
                        run_id: cooldown.run_id,
                        trial_index: cooldown.trial_index,
                    },
                );
                self.publish();
            }
            ResponseOutcome::Recorded => self.publish(),
            ResponseOutcome::RunCompleted => self.finish_current_task(),
            ResponseOutcome::Ignored => {}
        }
    }

    fn finish_current_task(&mut self) {
        let Some(score) = self.engines[self.current].score() else {
            warn!(task = ?self.engines[self.current].kind(), "run completed without a score");
            return;
        };
        info!(
            task = ?self.engines[self.current].kind(),
            value = score.value,
            hits = score.hits,
            misses = score.misses,
            "test finished"
        );
        self.aggregator.record(score);
        self.current += 1;
        if self.current < BATTERY_LEN {
            self.begin_current_task();
        } else {
            self.running = false;
            if let Some(result) = self.aggregator.result() {
                info!(average = result.average, tier = result.tier.label(), "battery finished");
            }
            self.publish();
        }
    }

    fn handle_submit(&mut self, name: Option<String>) {
        let Some(result) = self.aggregator.result() else {
            debug!("submit ignored: session incomplete");
            return;
        };
        let Some(gateway) = self.gateway.clone() else {
            debug!("submit ignored: no gateway configured");
            return;
        };
        let record = ScoreRecord::from_session(&result, name.as_deref());
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(err) = gateway.append(record).await {
                warn!(%err, "leaderboard write failed");
                let _ = tx.unbounded_send(BatteryEvent::SubmitFailed {
                    message: format!("Score could not be saved: {err}"),
                });
            }
        });
    }

    fn queue_after(&self, wait_ms: u64, event: BatteryEvent) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            timing::sleep_ms(wait_ms).await;
            let _ = tx.unbounded_send(event);
        });
    }

    fn publish(&self) {
        let engine = &self.engines[self.current.min(BATTERY_LEN - 1)];
        let snapshot = BatterySnapshot {
            task: Some(engine.kind()),
            countdown: self.countdown,
            stimulus: if self.current < BATTERY_LEN {
                engine.view()
            } else {
                StimulusView::default()
            },
            completed: self.aggregator.completed().to_vec(),
            result: self.aggregator.result(),
            notice: self.notice.clone(),
        };
        self.snap_tx.send_replace(snapshot);
    }
}
