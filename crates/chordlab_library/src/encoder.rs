//! Rotary encoder wire-format inference.
//!
//! Controllers ship encoders in several relative encodings with no way to
//! query which one is active. Each controller number gets a short observation
//! window; once it fills, the classification is fixed until an override
//! changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Samples gathered before a classification is committed.
pub const SAMPLE_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderMode {
    /// Raw value is a position; delta is the wrapped difference.
    Absolute,
    /// Values >= 64 are negative (`value - 128`).
    TwosComplement,
    /// Bit 6 is the sign, the low six bits the magnitude.
    SignMagnitude,
    /// 1 = step up, 127 = step down, anything else idle.
    OneStep,
}

impl EncoderMode {
    /// Converts a raw value into a signed step count. `previous` is only
    /// consulted by [`EncoderMode::Absolute`].
    pub fn delta(self, raw: u8, previous: Option<u8>) -> i32 {
        let raw = (raw & 0x7F) as i32;
        match self {
            EncoderMode::Absolute => {
                let Some(previous) = previous else {
                    return 0;
                };
                let diff = raw - (previous & 0x7F) as i32;
                if diff > 64 {
                    diff - 128
                } else if diff < -64 {
                    diff + 128
                } else {
                    diff
                }
            }
            EncoderMode::TwosComplement => {
                if raw >= 64 {
                    raw - 128
                } else {
                    raw
                }
            }
            EncoderMode::SignMagnitude => {
                let magnitude = raw & 0x3F;
                if raw & 0x40 != 0 { -magnitude } else { magnitude }
            }
            EncoderMode::OneStep => match raw {
                1 => 1,
                127 => -1,
                _ => 0,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EncoderMode::Absolute => "absolute",
            EncoderMode::TwosComplement => "twos-complement",
            EncoderMode::SignMagnitude => "sign-magnitude",
            EncoderMode::OneStep => "one-step",
        }
    }
}

/// Priority-ordered classification of the samples seen so far. Never fails:
/// anything inconclusive is treated as absolute.
pub fn classify(samples: &[u8]) -> EncoderMode {
    if samples.is_empty() {
        return EncoderMode::Absolute;
    }

    if samples.iter().all(|v| matches!(v, 0 | 1 | 127)) {
        return EncoderMode::OneStep;
    }

    if samples.iter().all(|v| (60..=68).contains(v)) {
        return EncoderMode::TwosComplement;
    }

    let has_positive = samples.iter().any(|&v| v & 0x40 == 0 && v != 0);
    let has_negative = samples.iter().any(|&v| v & 0x40 != 0 && v != 64);
    let small_steps = samples
        .iter()
        .all(|&v| v == 64 || v == 0 || (v & 0x3F) <= 16);
    if has_positive && has_negative && small_steps {
        return EncoderMode::SignMagnitude;
    }

    // Wide travel or many distinct positions look like an absolute knob;
    // anything else falls through to the same answer until more data arrives.
    EncoderMode::Absolute
}

/// Result of feeding one raw value through the inferrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderReading {
    pub controller: u8,
    pub mode: EncoderMode,
    pub delta: i32,
    pub raw: u8,
}

#[derive(Debug, Default)]
struct Observation {
    samples: Vec<u8>,
    resolved: Option<EncoderMode>,
    last_raw: Option<u8>,
}

/// Per-controller observation state plus pinned overrides.
#[derive(Debug, Default)]
pub struct EncoderInferrer {
    observations: HashMap<u8, Observation>,
    overrides: HashMap<u8, EncoderMode>,
}

impl EncoderInferrer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, controller: u8, raw: u8) -> EncoderReading {
        let raw = raw & 0x7F;
        let pinned = self.overrides.get(&controller).copied();
        let state = self.observations.entry(controller).or_default();

        let mode = match (pinned, state.resolved) {
            (Some(mode), _) => mode,
            (None, Some(mode)) => mode,
            (None, None) => {
                state.samples.push(raw);
                let mode = classify(&state.samples);
                if state.samples.len() >= SAMPLE_WINDOW {
                    debug!(controller, mode = mode.name(), "encoder mode resolved");
                    state.resolved = Some(mode);
                    state.samples.clear();
                }
                mode
            }
        };

        let delta = mode.delta(raw, state.last_raw);
        state.last_raw = Some(raw);

        EncoderReading {
            controller,
            mode,
            delta,
            raw,
        }
    }

    /// Pins (or with `None`, unpins) the encoding for a controller. Any
    /// change discards the observation window so inference restarts cleanly.
    pub fn set_override(&mut self, controller: u8, mode: Option<EncoderMode>) {
        let previous = match mode {
            Some(mode) => self.overrides.insert(controller, mode),
            None => self.overrides.remove(&controller),
        };
        if previous != mode {
            self.reset(controller);
        }
    }

    pub fn override_for(&self, controller: u8) -> Option<EncoderMode> {
        self.overrides.get(&controller).copied()
    }

    pub fn overridden_controllers(&self) -> impl Iterator<Item = u8> + '_ {
        self.overrides.keys().copied()
    }

    /// The mode in force for a controller, if one has been committed.
    pub fn mode_for(&self, controller: u8) -> Option<EncoderMode> {
        self.override_for(controller).or_else(|| {
            self.observations
                .get(&controller)
                .and_then(|state| state.resolved)
        })
    }

    pub fn reset(&mut self, controller: u8) {
        self.observations.remove(&controller);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(inferrer: &mut EncoderInferrer, controller: u8, values: &[u8]) -> EncoderReading {
        let mut last = None;
        for &value in values {
            last = Some(inferrer.observe(controller, value));
        }
        last.unwrap()
    }

    #[test]
    fn test_one_step_sequence() {
        let mut inferrer = EncoderInferrer::new();
        let reading = feed(&mut inferrer, 20, &[1, 1, 127, 1, 127, 1]);
        assert_eq!(reading.mode, EncoderMode::OneStep);
        assert_eq!(inferrer.mode_for(20), Some(EncoderMode::OneStep));
        assert_eq!(inferrer.observe(20, 1).delta, 1);
        assert_eq!(inferrer.observe(20, 127).delta, -1);
    }

    #[test]
    fn test_twos_complement_sequence() {
        let mut inferrer = EncoderInferrer::new();
        feed(&mut inferrer, 21, &[63, 65, 64, 66, 63, 64]);
        assert_eq!(inferrer.mode_for(21), Some(EncoderMode::TwosComplement));
        let reading = inferrer.observe(21, 70);
        assert_eq!(reading.mode, EncoderMode::TwosComplement);
        assert_eq!(reading.delta, 70 - 128);
    }

    #[test]
    fn test_absolute_sequence_wraps() {
        let mut inferrer = EncoderInferrer::new();
        feed(&mut inferrer, 22, &[68, 2, 100, 3, 95, 10]);
        assert_eq!(inferrer.mode_for(22), Some(EncoderMode::Absolute));

        assert_eq!(EncoderMode::Absolute.delta(103, Some(100)), 3);
        assert_eq!(EncoderMode::Absolute.delta(125, Some(2)), -5);
        assert_eq!(EncoderMode::Absolute.delta(2, Some(125)), 5);
        assert_eq!(EncoderMode::Absolute.delta(50, None), 0);

        inferrer.observe(22, 100);
        assert_eq!(inferrer.observe(22, 103).delta, 3);
    }

    #[test]
    fn test_sign_magnitude_sequence() {
        let mut inferrer = EncoderInferrer::new();
        feed(&mut inferrer, 23, &[1, 65, 2, 66, 64, 3]);
        assert_eq!(inferrer.mode_for(23), Some(EncoderMode::SignMagnitude));
        assert_eq!(inferrer.observe(23, 0x42).delta, -2);
        assert_eq!(inferrer.observe(23, 5).delta, 5);
        assert_eq!(inferrer.observe(23, 64).delta, 0);
    }

    #[test]
    fn test_provisional_classification_before_window_fills() {
        let mut inferrer = EncoderInferrer::new();
        let reading = inferrer.observe(30, 1);
        assert_eq!(reading.mode, EncoderMode::OneStep);
        assert_eq!(reading.delta, 1);
        assert_eq!(inferrer.mode_for(30), None);
    }

    #[test]
    fn test_override_skips_inference_and_clearing_restarts() {
        let mut inferrer = EncoderInferrer::new();
        inferrer.set_override(40, Some(EncoderMode::SignMagnitude));
        let reading = inferrer.observe(40, 1);
        assert_eq!(reading.mode, EncoderMode::SignMagnitude);
        assert_eq!(reading.delta, 1);
        assert_eq!(inferrer.mode_for(40), Some(EncoderMode::SignMagnitude));

        inferrer.set_override(40, None);
        assert_eq!(inferrer.mode_for(40), None);
        feed(&mut inferrer, 40, &[63, 65, 64, 66, 63, 64]);
        assert_eq!(inferrer.mode_for(40), Some(EncoderMode::TwosComplement));
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify(&[]), EncoderMode::Absolute);
        assert_eq!(classify(&[0, 0, 0]), EncoderMode::OneStep);
        assert_eq!(classify(&[64, 64]), EncoderMode::TwosComplement);
        assert_eq!(classify(&[10, 12]), EncoderMode::Absolute);
        assert_eq!(classify(&[0, 64, 5]), EncoderMode::Absolute);
    }
}
