//! Latency and random failure simulation for the throttling/dead-letter demo.

use std::time::Duration;

use rand::Rng;

use crate::adapters::pause::Pause;
use crate::handlers::consumer::MessageError;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StressSettings {
    fail_ratio: f64,
    sleep_ms: u64,
    jitter_ms: u64,
}

impl StressSettings {
    /// `fail_ratio` is clamped to `0.0..=1.0`.
    pub fn new(fail_ratio: f64, sleep_ms: u64, jitter_ms: u64) -> Self {
        Self {
            fail_ratio: fail_ratio.clamp(0.0, 1.0),
            sleep_ms,
            jitter_ms,
        }
    }

    pub fn fail_ratio(&self) -> f64 {
        self.fail_ratio
    }
}

pub trait Randomness: Send + Sync {
    /// Uniform sample in `[0, 1)`.
    fn unit(&self) -> f64;

    /// Uniform sample in `0..=max`.
    fn up_to(&self, max: u64) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandomness;

impl Randomness for ThreadRandomness {
    fn unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn up_to(&self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=max)
    }
}

pub struct StressSimulator<'a> {
    settings: StressSettings,
    randomness: &'a dyn Randomness,
    pause: &'a dyn Pause,
}

impl<'a> StressSimulator<'a> {
    pub fn new(
        settings: StressSettings,
        randomness: &'a dyn Randomness,
        pause: &'a dyn Pause,
    ) -> Self {
        Self {
            settings,
            randomness,
            pause,
        }
    }

    /// Applies the fixed delay plus jitter once, then rolls for a simulated
    /// failure. Returns the delay that was applied.
    pub fn disturb(&self) -> Result<Duration, MessageError> {
        let delay_ms = self
            .settings
            .sleep_ms
            .saturating_add(self.randomness.up_to(self.settings.jitter_ms));
        let delay = Duration::from_millis(delay_ms);
        self.pause.pause(delay);

        let roll = self.randomness.unit();
        if roll < self.settings.fail_ratio {
            return Err(MessageError::Simulated {
                roll,
                fail_ratio: self.settings.fail_ratio,
            });
        }
        Ok(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingPause, ScriptedRandomness};

    #[test]
    fn applies_sleep_plus_jitter_before_rolling() {
        let randomness = ScriptedRandomness::new(vec![0.9], 30);
        let pause = RecordingPause::new();
        let simulator =
            StressSimulator::new(StressSettings::new(0.5, 100, 50), &randomness, &pause);

        let delay = simulator.disturb().expect("roll above ratio should pass");
        assert_eq!(delay, Duration::from_millis(130));
        assert_eq!(pause.pauses(), vec![Duration::from_millis(130)]);
    }

    #[test]
    fn fails_when_roll_is_below_ratio() {
        let randomness = ScriptedRandomness::new(vec![0.1], 0);
        let pause = RecordingPause::new();
        let simulator = StressSimulator::new(StressSettings::new(0.5, 0, 0), &randomness, &pause);

        let error = simulator.disturb().expect_err("roll below ratio should fail");
        assert!(matches!(error, MessageError::Simulated { .. }));
    }

    #[test]
    fn zero_ratio_never_fails_and_full_ratio_always_fails() {
        let pause = RecordingPause::new();

        let randomness = ScriptedRandomness::new(vec![0.0], 0);
        let never = StressSimulator::new(StressSettings::new(0.0, 0, 0), &randomness, &pause);
        assert!(never.disturb().is_ok());

        let randomness = ScriptedRandomness::new(vec![0.999_999], 0);
        let always = StressSimulator::new(StressSettings::new(1.0, 0, 0), &randomness, &pause);
        assert!(always.disturb().is_err());
    }

    #[test]
    fn thread_randomness_stays_in_bounds() {
        let randomness = ThreadRandomness;
        for _ in 0..200 {
            let unit = randomness.unit();
            assert!((0.0..1.0).contains(&unit));
            assert!(randomness.up_to(5) <= 5);
        }
        assert_eq!(randomness.up_to(0), 0);
    }
}
