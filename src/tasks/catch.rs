//! Falling-object catch engine.
//!
//! Two lanes; each trial drops one object after a randomized delay. Catching
//! the falling object is a hit, grabbing the other lane is a miss, and input
//! while nothing is falling is ignored. An unanswered drop simply waits —
//! the trial resolves only on input. Five trials, accuracy+speed scoring.

use tracing::debug;

use crate::classify::{classify, Classification, PrematurePolicy};
use crate::core::scheduler::{DelayRange, DelaySource, ScheduledStimulus, TargetSource};
use crate::core::timing::InstantStamp;
use crate::score::{accuracy_speed, GameScore};
use crate::trial::{Stimulus, TargetId, TrialLedger, TrialOutcome};

use super::{
    ArmOutcome, CountdownStep, EngineState, ResponseOutcome, ScheduledCountdown, TaskEngine,
    TaskKind, COUNTDOWN_STEP_MS,
};

#[derive(Debug, Clone, Copy)]
pub struct CatchConfig {
    pub trials: usize,
    pub lanes: usize,
    pub delay: DelayRange,
    pub countdown_from: u8,
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            trials: 5,
            lanes: 2,
            delay: DelayRange::new(2000, 5000),
            countdown_from: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatchEngine {
    pub config: CatchConfig,
    pub state: EngineState,
    pub run_id: u64,
    pub ledger: TrialLedger,
    delays: DelaySource,
    targets: TargetSource,
    active: Option<Stimulus>,
    next_trial: usize,
}

impl Default for CatchEngine {
    fn default() -> Self {
        Self::new(CatchConfig::default())
    }
}

impl CatchEngine {
    pub fn new(config: CatchConfig) -> Self {
        Self::with_sources(config, DelaySource::Uniform, TargetSource::Uniform)
    }

    pub fn with_sources(config: CatchConfig, delays: DelaySource, targets: TargetSource) -> Self {
        Self {
            config,
            state: EngineState::Idle,
            run_id: 0,
            ledger: TrialLedger::bounded(config.trials),
            delays,
            targets,
            active: None,
            next_trial: 0,
        }
    }

    fn arm_next(&mut self) -> ScheduledStimulus {
        let trial_index = self.next_trial;
        self.next_trial += 1;
        self.state = EngineState::AwaitingStimulus { trial_index };
        ScheduledStimulus {
            run_id: self.run_id,
            trial_index,
            wait_ms: self.delays.sample(self.config.delay),
        }
    }
}

impl TaskEngine for CatchEngine {
    fn kind(&self) -> TaskKind {
        TaskKind::Catch
    }

    fn start(&mut self) -> Option<ScheduledCountdown> {
        if !matches!(self.state, EngineState::Idle | EngineState::Complete) {
            return None;
        }
        self.run_id += 1;
        self.ledger = TrialLedger::bounded(self.config.trials);
        self.active = None;
        self.next_trial = 0;
        self.state = EngineState::Countdown {
            remaining: self.config.countdown_from,
        };
        debug!(run_id = self.run_id, "catch run started");
        Some(ScheduledCountdown {
            run_id: self.run_id,
            remaining: self.config.countdown_from,
            wait_ms: COUNTDOWN_STEP_MS,
        })
    }

    fn abort(&mut self) {
        self.run_id += 1;
        self.state = EngineState::Idle;
        self.active = None;
        self.next_trial = 0;
        self.ledger = TrialLedger::bounded(self.config.trials);
    }

    fn run_id(&self) -> u64 {
        self.run_id
    }

    fn tick_countdown(&mut self, run_id: u64) -> CountdownStep {
        if run_id != self.run_id {
            return CountdownStep::Stale;
        }
        let EngineState::Countdown { remaining } = self.state else {
            return CountdownStep::Stale;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.state = EngineState::Countdown { remaining };
            CountdownStep::Tick(ScheduledCountdown {
                run_id: self.run_id,
                remaining,
                wait_ms: COUNTDOWN_STEP_MS,
            })
        } else {
            CountdownStep::Go {
                first: self.arm_next(),
                run_timer_ms: None,
            }
        }
    }

    fn mark_stimulus_on(
        &mut self,
        run_id: u64,
        trial_index: usize,
        now: InstantStamp,
    ) -> ArmOutcome {
        if run_id != self.run_id || self.state != (EngineState::AwaitingStimulus { trial_index }) {
            return ArmOutcome::Stale;
        }
        self.active = Some(Stimulus {
            target: self.targets.pick(self.config.lanes),
            onset: now,
            active_window_ms: None,
        });
        self.state = EngineState::StimulusActive { trial_index };
        ArmOutcome::Active { window_ms: None }
    }

    fn register_press(&mut self, target: Option<TargetId>, now: InstantStamp) -> ResponseOutcome {
        let EngineState::StimulusActive { trial_index } = self.state else {
            // Nothing falling: early grabs are not penalized here.
            return ResponseOutcome::Ignored;
        };
        let Classification::Outcome(outcome) =
            classify(self.active.as_ref(), target, now, PrematurePolicy::Ignore)
        else {
            return ResponseOutcome::Ignored;
        };
        if let TrialOutcome::Hit { rt_ms } = outcome {
            debug!(run_id = self.run_id, trial_index, rt_ms, "object caught");
        }
        self.ledger.append(outcome);
        self.active = None;
        if self.ledger.is_complete() {
            self.state = EngineState::Complete;
            debug!(run_id = self.run_id, "catch run complete");
            ResponseOutcome::RunCompleted
        } else {
            ResponseOutcome::NextScheduled(self.arm_next())
        }
    }

    fn view(&self) -> super::StimulusView {
        super::StimulusView {
            stimulus_active: matches!(self.state, EngineState::StimulusActive { .. }),
            target: self.active.map(|s| s.target),
        }
    }

    fn score(&self) -> Option<GameScore> {
        self.ledger
            .is_complete()
            .then(|| accuracy_speed(&self.ledger))
    }
}
