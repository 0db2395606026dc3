//! Stimulus scheduling primitives: randomized delays, target selection and
//! the handle a timer callback carries back into an engine.
//!
//! Engines never poll. They hand a [`ScheduledStimulus`] to the driver, which
//! sleeps for `wait_ms` and then calls back with the embedded `run_id` and
//! `trial_index`. A run that has been aborted or restarted in the meantime
//! has a different `run_id`, so the stale callback is ignored instead of
//! mutating a dead run.

use rand::Rng;

/// Half-open delay range in milliseconds: samples fall in `[min_ms, max_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        debug_assert!(min_ms < max_ms, "delay range must be non-empty");
        Self { min_ms, max_ms }
    }

    /// Degenerate range producing exactly `ms`.
    pub fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms + 1,
        }
    }
}

/// Where stimulus-onset delays come from. `Uniform` is the production source;
/// `Fixed` pins every delay for deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum DelaySource {
    #[default]
    Uniform,
    Fixed(u64),
}

impl DelaySource {
    pub fn sample(&self, range: DelayRange) -> u64 {
        match self {
            Self::Uniform => rand::thread_rng().gen_range(range.min_ms..range.max_ms),
            Self::Fixed(ms) => *ms,
        }
    }
}

/// Which target lights up next, out of `count` positions.
#[derive(Debug, Clone, Copy, Default)]
pub enum TargetSource {
    #[default]
    Uniform,
    Fixed(usize),
}

impl TargetSource {
    pub fn pick(&self, count: usize) -> usize {
        debug_assert!(count > 0, "target pick from empty set");
        match self {
            Self::Uniform => rand::thread_rng().gen_range(0..count),
            Self::Fixed(index) => *index % count,
        }
    }
}

/// A pending stimulus onset: sleep `wait_ms`, then call the engine back with
/// `run_id` and `trial_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledStimulus {
    pub run_id: u64,
    pub trial_index: usize,
    pub wait_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sample_stays_in_range() {
        let range = DelayRange::new(2000, 5000);
        let source = DelaySource::Uniform;
        for _ in 0..200 {
            let delay = source.sample(range);
            assert!((2000..5000).contains(&delay));
        }
    }

    #[test]
    fn fixed_sample_ignores_range() {
        let source = DelaySource::Fixed(42);
        assert_eq!(source.sample(DelayRange::new(2000, 5000)), 42);
    }

    #[test]
    fn fixed_range_produces_its_value() {
        let range = DelayRange::fixed(1000);
        assert_eq!(DelaySource::Uniform.sample(range), 1000);
    }

    #[test]
    fn uniform_pick_covers_targets() {
        let source = TargetSource::Uniform;
        let mut seen = [false; 4];
        for _ in 0..500 {
            seen[source.pick(4)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn fixed_pick_wraps_into_bounds() {
        assert_eq!(TargetSource::Fixed(5).pick(4), 1);
    }
}
