//! Task engines for the three-test battery.
//!
//! Each engine is a synchronous state machine in the shape the driver
//! expects: `start` hands back a countdown schedule, timer callbacks re-enter
//! through `tick_countdown` / `mark_stimulus_on` / `register_window_expiry` /
//! `finish_cooldown` / `register_time_up` (all guarded by the `run_id` they
//! were armed under), and raw input lands in `register_press`. Engines own
//! their trial ledger and reduce it to a [`GameScore`] once complete; real
//! time only ever enters through the driver.

pub mod batak;
pub mod catch;
pub mod lights;

pub use batak::{BatakConfig, BatakEngine, BatakMode};
pub use catch::{CatchConfig, CatchEngine};
pub use lights::{LightsConfig, LightsEngine};

use serde::{Deserialize, Serialize};

use crate::core::scheduler::ScheduledStimulus;
use crate::core::timing::InstantStamp;
use crate::score::GameScore;
use crate::trial::TargetId;

/// Milliseconds per step of the pre-run countdown.
pub const COUNTDOWN_STEP_MS: u64 = 1000;

/// The three tests, in battery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Batak,
    Catch,
    Lights,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Batak => "Batak",
            Self::Catch => "Tennis Ball Catch",
            Self::Lights => "Lights Out",
        }
    }
}

/// Phase of a running engine, independent of any rendering concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Countdown {
        remaining: u8,
    },
    AwaitingStimulus {
        trial_index: usize,
    },
    StimulusActive {
        trial_index: usize,
    },
    /// Trial resolved, a cool-down timer runs before the next arm.
    Resolved {
        trial_index: usize,
    },
    Complete,
}

/// A pending countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledCountdown {
    pub run_id: u64,
    pub remaining: u8,
    pub wait_ms: u64,
}

/// What a countdown tick turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    Tick(ScheduledCountdown),
    /// Countdown finished: arm the first stimulus, and for clock-limited
    /// tasks start the run timer.
    Go {
        first: ScheduledStimulus,
        run_timer_ms: Option<u64>,
    },
    Stale,
}

/// Result of a stimulus-onset callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// The stimulus is now active; if `window_ms` is set, schedule its
    /// expiry.
    Active { window_ms: Option<u64> },
    /// The run this onset was armed for no longer exists.
    Stale,
}

/// How an input or timer event resolved against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Trial resolved; sleep and deliver the next stimulus onset.
    NextScheduled(ScheduledStimulus),
    /// Trial resolved into a penalty; sleep and call `finish_cooldown`.
    CooldownScheduled(ScheduledStimulus),
    /// An outcome was appended but scheduling is unchanged (grid tapper
    /// presses while no cell is lit).
    Recorded,
    RunCompleted,
    Ignored,
}

/// Presentation-facing stimulus state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StimulusView {
    pub stimulus_active: bool,
    pub target: Option<TargetId>,
}

/// Common driver-facing surface of the three engines. Entry points that a
/// given task never uses keep the defaults.
pub trait TaskEngine: Send {
    fn kind(&self) -> TaskKind;

    /// Begin a fresh run. `None` when a run is already in progress.
    fn start(&mut self) -> Option<ScheduledCountdown>;

    /// Tear the run down; bumps the run id so in-flight timers go stale.
    fn abort(&mut self);

    fn run_id(&self) -> u64;

    fn tick_countdown(&mut self, run_id: u64) -> CountdownStep;

    fn mark_stimulus_on(&mut self, run_id: u64, trial_index: usize, now: InstantStamp)
        -> ArmOutcome;

    fn register_press(&mut self, target: Option<TargetId>, now: InstantStamp) -> ResponseOutcome;

    fn register_window_expiry(&mut self, _run_id: u64, _trial_index: usize) -> ResponseOutcome {
        ResponseOutcome::Ignored
    }

    fn finish_cooldown(&mut self, _run_id: u64, _trial_index: usize) -> ResponseOutcome {
        ResponseOutcome::Ignored
    }

    fn register_time_up(&mut self, _run_id: u64) -> ResponseOutcome {
        ResponseOutcome::Ignored
    }

    fn view(&self) -> StimulusView;

    /// The reduced score, present once the run completed.
    fn score(&self) -> Option<GameScore>;
}
