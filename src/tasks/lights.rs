//! Go/no-go light reaction engine.
//!
//! Each trial waits a randomized delay, then the light goes green and stays
//! green until pressed. Pressing during the wait is a premature response: it
//! spends the trial, discards the pending light and imposes a cool-down
//! before the next trial is armed. Five trials, scored with the
//! accuracy+speed formula.

use tracing::debug;

use crate::classify::{classify, Classification, PrematurePolicy};
use crate::core::scheduler::{DelayRange, DelaySource, ScheduledStimulus};
use crate::core::timing::InstantStamp;
use crate::score::{accuracy_speed, GameScore};
use crate::trial::{Stimulus, TargetId, TrialLedger, TrialOutcome};

use super::{
    ArmOutcome, CountdownStep, EngineState, ResponseOutcome, ScheduledCountdown, TaskEngine,
    TaskKind, COUNTDOWN_STEP_MS,
};

#[derive(Debug, Clone, Copy)]
pub struct LightsConfig {
    pub trials: usize,
    pub delay: DelayRange,
    /// Pause after a premature press before the next trial is armed.
    pub cooldown_ms: u64,
    pub countdown_from: u8,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            trials: 5,
            delay: DelayRange::new(2000, 5000),
            cooldown_ms: 1000,
            countdown_from: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LightsEngine {
    pub config: LightsConfig,
    pub state: EngineState,
    pub run_id: u64,
    pub ledger: TrialLedger,
    delays: DelaySource,
    active: Option<Stimulus>,
    next_trial: usize,
}

impl Default for LightsEngine {
    fn default() -> Self {
        Self::new(LightsConfig::default())
    }
}

impl LightsEngine {
    pub fn new(config: LightsConfig) -> Self {
        Self::with_delays(config, DelaySource::Uniform)
    }

    pub fn with_delays(config: LightsConfig, delays: DelaySource) -> Self {
        Self {
            config,
            state: EngineState::Idle,
            run_id: 0,
            ledger: TrialLedger::bounded(config.trials),
            delays,
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

    fn after_outcome(&mut self) -> ResponseOutcome {
        if self.ledger.is_complete() {
            self.state = EngineState::Complete;
            debug!(run_id = self.run_id, "lights run complete");
            ResponseOutcome::RunCompleted
        } else {
            ResponseOutcome::NextScheduled(self.arm_next())
        }
    }
}

impl TaskEngine for LightsEngine {
    fn kind(&self) -> TaskKind {
        TaskKind::Lights
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
        debug!(run_id = self.run_id, "lights run started");
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
            target: 0,
            onset: now,
            active_window_ms: None,
        });
        self.state = EngineState::StimulusActive { trial_index };
        ArmOutcome::Active { window_ms: None }
    }

    fn register_press(&mut self, _target: Option<TargetId>, now: InstantStamp) -> ResponseOutcome {
        match self.state {
            EngineState::StimulusActive { trial_index } => {
                let Classification::Outcome(outcome) = classify(
                    self.active.as_ref(),
                    Some(0),
                    now,
                    PrematurePolicy::Premature,
                ) else {
                    return ResponseOutcome::Ignored;
                };
                if let TrialOutcome::Hit { rt_ms } = outcome {
                    debug!(run_id = self.run_id, trial_index, rt_ms, "light answered");
                }
                self.ledger.append(outcome);
                self.active = None;
                self.after_outcome()
            }
            EngineState::AwaitingStimulus { trial_index } => {
                // Jumped the light. The pending onset for this trial becomes
                // stale once the state advances; completion waits for the
                // cool-down either way.
                self.ledger.append(TrialOutcome::Premature);
                debug!(run_id = self.run_id, trial_index, "premature press");
                self.state = EngineState::Resolved { trial_index };
                ResponseOutcome::CooldownScheduled(ScheduledStimulus {
                    run_id: self.run_id,
                    trial_index,
                    wait_ms: self.config.cooldown_ms,
                })
            }
            // Presses during the cool-down, countdown or after completion
            // mean nothing.
            _ => ResponseOutcome::Ignored,
        }
    }

    fn finish_cooldown(&mut self, run_id: u64, trial_index: usize) -> ResponseOutcome {
        if run_id != self.run_id || self.state != (EngineState::Resolved { trial_index }) {
            return ResponseOutcome::Ignored;
        }
        self.after_outcome()
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
