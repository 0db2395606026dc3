//! Grid-target tapper engine (batak board).
//!
//! A 4×4 board lights one cell at a time on a fixed cadence for a 30 second
//! run. Pressing the lit cell is a hit; a wrong cell, the background, or a
//! dark board is a miss. A cell left unanswered for a full cadence expires
//! as a miss and the next one lights immediately, keeping the flash rhythm.
//! Acceleration mode tightens the cadence per flash down to a floor; Sudden
//! Death ends the run on the first miss. Scored with the time-budget
//! formula over the configured run length.

use tracing::debug;

use crate::classify::{classify, expire, Classification, PrematurePolicy};
use crate::core::scheduler::{ScheduledStimulus, TargetSource};
use crate::core::timing::InstantStamp;
use crate::score::{time_budget, GameScore};
use crate::trial::{Stimulus, TargetId, TrialLedger, TrialOutcome};

use super::{
    ArmOutcome, CountdownStep, EngineState, ResponseOutcome, ScheduledCountdown, TaskEngine,
    TaskKind, COUNTDOWN_STEP_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatakMode {
    #[default]
    Classic,
    Speed,
    Acceleration,
    SuddenDeath,
}

impl BatakMode {
    /// Flash cadence the mode starts with, in milliseconds.
    pub fn initial_cadence_ms(&self) -> u64 {
        match self {
            Self::Classic | Self::Acceleration | Self::SuddenDeath => 1000,
            Self::Speed => 500,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatakConfig {
    pub mode: BatakMode,
    pub rows: usize,
    pub cols: usize,
    pub total_time_s: u64,
    /// Cadence reduction per flash in Acceleration mode.
    pub accel_step_ms: u64,
    pub accel_floor_ms: u64,
    pub countdown_from: u8,
}

impl Default for BatakConfig {
    fn default() -> Self {
        Self {
            mode: BatakMode::Classic,
            rows: 4,
            cols: 4,
            total_time_s: 30,
            accel_step_ms: 30,
            accel_floor_ms: 300,
            countdown_from: 3,
        }
    }
}

impl BatakConfig {
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

#[derive(Debug, Clone)]
pub struct BatakEngine {
    pub config: BatakConfig,
    pub state: EngineState,
    pub run_id: u64,
    pub ledger: TrialLedger,
    targets: TargetSource,
    active: Option<Stimulus>,
    cadence_ms: u64,
    next_trial: usize,
}

impl Default for BatakEngine {
    fn default() -> Self {
        Self::new(BatakConfig::default())
    }
}

impl BatakEngine {
    pub fn new(config: BatakConfig) -> Self {
        Self::with_targets(config, TargetSource::Uniform)
    }

    pub fn with_targets(config: BatakConfig, targets: TargetSource) -> Self {
        Self {
            config,
            state: EngineState::Idle,
            run_id: 0,
            ledger: TrialLedger::unbounded(),
            targets,
            active: None,
            cadence_ms: config.mode.initial_cadence_ms(),
            next_trial: 0,
        }
    }

    fn arm_next(&mut self, wait_ms: u64) -> ScheduledStimulus {
        let trial_index = self.next_trial;
        self.next_trial += 1;
        self.state = EngineState::AwaitingStimulus { trial_index };
        ScheduledStimulus {
            run_id: self.run_id,
            trial_index,
            wait_ms,
        }
    }

    fn sudden_death_on_miss(&self) -> bool {
        self.config.mode == BatakMode::SuddenDeath
    }

    fn terminate(&mut self) -> ResponseOutcome {
        self.ledger.terminate();
        self.active = None;
        self.state = EngineState::Complete;
        debug!(run_id = self.run_id, trials = self.ledger.len(), "batak run complete");
        ResponseOutcome::RunCompleted
    }
}

impl TaskEngine for BatakEngine {
    fn kind(&self) -> TaskKind {
        TaskKind::Batak
    }

    fn start(&mut self) -> Option<ScheduledCountdown> {
        if !matches!(self.state, EngineState::Idle | EngineState::Complete) {
            return None;
        }
        self.run_id += 1;
        self.ledger = TrialLedger::unbounded();
        self.active = None;
        self.next_trial = 0;
        self.cadence_ms = self.config.mode.initial_cadence_ms();
        self.state = EngineState::Countdown {
            remaining: self.config.countdown_from,
        };
        debug!(run_id = self.run_id, mode = ?self.config.mode, "batak run started");
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
        self.cadence_ms = self.config.mode.initial_cadence_ms();
        self.ledger = TrialLedger::unbounded();
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
            let wait = self.cadence_ms;
            CountdownStep::Go {
                first: self.arm_next(wait),
                run_timer_ms: Some(self.config.total_time_s * 1000),
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
        let window_ms = self.cadence_ms;
        self.active = Some(Stimulus {
            target: self.targets.pick(self.config.cells()),
            onset: now,
            active_window_ms: Some(window_ms),
        });
        self.state = EngineState::StimulusActive { trial_index };
        if self.config.mode == BatakMode::Acceleration {
            self.cadence_ms = self
                .cadence_ms
                .saturating_sub(self.config.accel_step_ms)
                .max(self.config.accel_floor_ms);
        }
        ArmOutcome::Active {
            window_ms: Some(window_ms),
        }
    }

    fn register_press(&mut self, target: Option<TargetId>, now: InstantStamp) -> ResponseOutcome {
        match self.state {
            EngineState::StimulusActive { trial_index } => {
                let Classification::Outcome(outcome) =
                    classify(self.active.as_ref(), target, now, PrematurePolicy::Miss)
                else {
                    return ResponseOutcome::Ignored;
                };
                if let TrialOutcome::Hit { rt_ms } = outcome {
                    debug!(run_id = self.run_id, trial_index, rt_ms, "cell hit");
                }
                self.ledger.append(outcome);
                self.active = None;
                if outcome == TrialOutcome::Miss && self.sudden_death_on_miss() {
                    return self.terminate();
                }
                let wait = self.cadence_ms;
                ResponseOutcome::NextScheduled(self.arm_next(wait))
            }
            EngineState::AwaitingStimulus { .. } => {
                // Dark board. The miss is recorded against the run but the
                // pending flash keeps its schedule.
                self.ledger.append(TrialOutcome::Miss);
                if self.sudden_death_on_miss() {
                    return self.terminate();
                }
                ResponseOutcome::Recorded
            }
            _ => ResponseOutcome::Ignored,
        }
    }

    fn register_window_expiry(&mut self, run_id: u64, trial_index: usize) -> ResponseOutcome {
        if run_id != self.run_id || self.state != (EngineState::StimulusActive { trial_index }) {
            return ResponseOutcome::Ignored;
        }
        self.ledger.append(expire());
        self.active = None;
        debug!(run_id = self.run_id, trial_index, "flash expired unanswered");
        if self.sudden_death_on_miss() {
            return self.terminate();
        }
        // The replacement cell lights the moment the old one goes dark.
        ResponseOutcome::NextScheduled(self.arm_next(0))
    }

    fn register_time_up(&mut self, run_id: u64) -> ResponseOutcome {
        if run_id != self.run_id || self.state == EngineState::Complete {
            return ResponseOutcome::Ignored;
        }
        self.terminate()
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
            .then(|| time_budget(&self.ledger, self.config.total_time_s as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(config: BatakConfig, cell: usize) -> (BatakEngine, ScheduledStimulus) {
        let mut eng = BatakEngine::with_targets(config, TargetSource::Fixed(cell));
        let sc = eng.start().expect("fresh engine starts");
        let mut step = eng.tick_countdown(sc.run_id);
        loop {
            match step {
                CountdownStep::Tick(tick) => step = eng.tick_countdown(tick.run_id),
                CountdownStep::Go { first, run_timer_ms } => {
                    assert_eq!(run_timer_ms, Some(config.total_time_s * 1000));
                    return (eng, first);
                }
                CountdownStep::Stale => panic!("countdown went stale"),
            }
        }
    }

    fn mode(mode: BatakMode) -> BatakConfig {
        BatakConfig {
            mode,
            ..BatakConfig::default()
        }
    }

    #[test]
    fn classic_flashes_on_a_one_second_cadence() {
        let (mut eng, first) = started(mode(BatakMode::Classic), 5);
        assert_eq!(first.wait_ms, 1000);
        let armed = eng.mark_stimulus_on(first.run_id, first.trial_index, InstantStamp(0.0));
        assert_eq!(
            armed,
            ArmOutcome::Active {
                window_ms: Some(1000)
            }
        );
        assert_eq!(eng.view().target, Some(5));
    }

    #[test]
    fn speed_mode_halves_the_cadence() {
        let (_eng, first) = started(mode(BatakMode::Speed), 0);
        assert_eq!(first.wait_ms, 500);
    }

    #[test]
    fn acceleration_tightens_cadence_to_the_floor() {
        let (mut eng, first) = started(mode(BatakMode::Acceleration), 0);
        assert_eq!(first.wait_ms, 1000);
        let mut schedule = first;
        let mut windows = Vec::new();
        for _ in 0..30 {
            let ArmOutcome::Active { window_ms } =
                eng.mark_stimulus_on(schedule.run_id, schedule.trial_index, InstantStamp(0.0))
            else {
                panic!("onset rejected");
            };
            windows.push(window_ms.unwrap());
            let ResponseOutcome::NextScheduled(next) =
                eng.register_press(Some(0), InstantStamp(100.0))
            else {
                panic!("expected next flash");
            };
            schedule = next;
        }
        assert_eq!(windows[0], 1000);
        assert_eq!(windows[1], 970);
        // 1000 - 30*k bottoms out at the 300ms floor from flash 24 on.
        assert_eq!(windows[23], 310);
        assert_eq!(*windows.last().unwrap(), 300);
        let ArmOutcome::Active { window_ms } =
            eng.mark_stimulus_on(schedule.run_id, schedule.trial_index, InstantStamp(0.0))
        else {
            panic!("onset rejected");
        };
        assert_eq!(window_ms, Some(300));
    }

    #[test]
    fn hit_on_lit_cell_records_reaction_time() {
        let (mut eng, first) = started(mode(BatakMode::Classic), 7);
        eng.mark_stimulus_on(first.run_id, first.trial_index, InstantStamp(2_000.0));
        let outcome = eng.register_press(Some(7), InstantStamp(2_340.0));
        assert!(matches!(outcome, ResponseOutcome::NextScheduled(_)));
        assert_eq!(eng.ledger.reaction_times(), vec![340.0]);
    }

    #[test]
    fn wrong_cell_and_background_are_misses() {
        let (mut eng, first) = started(mode(BatakMode::Classic), 7);
        eng.mark_stimulus_on(first.run_id, first.trial_index, InstantStamp(0.0));
        let outcome = eng.register_press(Some(3), InstantStamp(100.0));
        let ResponseOutcome::NextScheduled(next) = outcome else {
            panic!("expected next flash, got {outcome:?}");
        };
        eng.mark_stimulus_on(next.run_id, next.trial_index, InstantStamp(1_000.0));
        let outcome = eng.register_press(None, InstantStamp(1_100.0));
        assert!(matches!(outcome, ResponseOutcome::NextScheduled(_)));
        assert_eq!(eng.ledger.misses(), 2);
    }

    #[test]
    fn dark_board_press_is_a_miss_that_keeps_the_schedule() {
        let (mut eng, _first) = started(mode(BatakMode::Classic), 0);
        // Still awaiting the first flash.
        assert_eq!(
            eng.register_press(Some(4), InstantStamp(100.0)),
            ResponseOutcome::Recorded
        );
        assert_eq!(eng.ledger.misses(), 1);
        assert_eq!(eng.state, EngineState::AwaitingStimulus { trial_index: 0 });
    }

    #[test]
    fn unanswered_flash_expires_as_miss_and_relights_immediately() {
        let (mut eng, first) = started(mode(BatakMode::Classic), 0);
        eng.mark_stimulus_on(first.run_id, first.trial_index, InstantStamp(0.0));
        let outcome = eng.register_window_expiry(first.run_id, first.trial_index);
        let ResponseOutcome::NextScheduled(next) = outcome else {
            panic!("expected replacement flash, got {outcome:?}");
        };
        assert_eq!(next.wait_ms, 0);
        assert_eq!(eng.ledger.misses(), 1);
        // The expiry already resolved the trial; a late press must not
        // double-resolve it.
        assert_eq!(
            eng.register_window_expiry(first.run_id, first.trial_index),
            ResponseOutcome::Ignored
        );
    }

    #[test]
    fn sudden_death_ends_on_first_miss_with_ledger_frozen() {
        let (mut eng, first) = started(mode(BatakMode::SuddenDeath), 0);
        let mut schedule = first;
        // Two hits first.
        for _ in 0..2 {
            eng.mark_stimulus_on(schedule.run_id, schedule.trial_index, InstantStamp(0.0));
            let ResponseOutcome::NextScheduled(next) =
                eng.register_press(Some(0), InstantStamp(200.0))
            else {
                panic!("expected next flash");
            };
            schedule = next;
        }
        eng.mark_stimulus_on(schedule.run_id, schedule.trial_index, InstantStamp(0.0));
        let outcome = eng.register_press(Some(9), InstantStamp(100.0));
        assert_eq!(outcome, ResponseOutcome::RunCompleted);
        // 2 hits + the terminating miss; nothing further is presented.
        assert_eq!(eng.ledger.len(), 3);
        assert!(eng.ledger.is_complete());
        assert_eq!(eng.state, EngineState::Complete);
    }

    #[test]
    fn sudden_death_triggers_on_expiry_too() {
        let (mut eng, first) = started(mode(BatakMode::SuddenDeath), 0);
        eng.mark_stimulus_on(first.run_id, first.trial_index, InstantStamp(0.0));
        assert_eq!(
            eng.register_window_expiry(first.run_id, first.trial_index),
            ResponseOutcome::RunCompleted
        );
    }

    #[test]
    fn time_up_finalizes_and_scores_against_full_budget() {
        let (mut eng, first) = started(mode(BatakMode::Classic), 0);
        let mut schedule = first;
        for _ in 0..10 {
            eng.mark_stimulus_on(schedule.run_id, schedule.trial_index, InstantStamp(0.0));
            let ResponseOutcome::NextScheduled(next) =
                eng.register_press(Some(0), InstantStamp(250.0))
            else {
                panic!("expected next flash");
            };
            schedule = next;
        }
        assert_eq!(eng.register_time_up(first.run_id), ResponseOutcome::RunCompleted);
        let score = eng.score().unwrap();
        assert_eq!(score.hits, 10);
        // accuracy 1, avg 30/10 = 3.0s: 70 + 30 * (1 - 1.2) = 64.
        assert_eq!(score.value, 64);
        // Stale run timer from a previous run does nothing.
        assert_eq!(eng.register_time_up(first.run_id), ResponseOutcome::Ignored);
    }

    #[test]
    fn stale_run_timer_from_aborted_run_is_ignored() {
        let (mut eng, first) = started(mode(BatakMode::Classic), 0);
        eng.abort();
        assert_eq!(eng.register_time_up(first.run_id), ResponseOutcome::Ignored);
        assert_eq!(eng.state, EngineState::Idle);
    }
}
