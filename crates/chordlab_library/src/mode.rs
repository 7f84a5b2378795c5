//! Performance mode selection from the MiniLab's main encoder and Shift.

use num_derive::FromPrimitive;
use tracing::debug;

pub const SHIFT_CC: u8 = 27;
pub const MODE_ENCODER_CC: u8 = 28;
/// Pressing the main encoder.
pub const MODE_ENCODER_PRESS: u8 = 118;

pub const SUBTYPE_COUNT: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum PerformanceMode {
    #[default]
    Chord = 0,
    Strum,
    Arp,
    Scale,
    Voicing,
    Rhythm,
    Fx,
    Morph,
    Performance,
    Sampler,
}

impl PerformanceMode {
    pub const COUNT: usize = 10;

    pub fn name(self) -> &'static str {
        match self {
            PerformanceMode::Chord => "Chord",
            PerformanceMode::Strum => "Strum",
            PerformanceMode::Arp => "Arp",
            PerformanceMode::Scale => "Scale",
            PerformanceMode::Voicing => "Voicing",
            PerformanceMode::Rhythm => "Rhythm",
            PerformanceMode::Fx => "FX",
            PerformanceMode::Morph => "Morph",
            PerformanceMode::Performance => "Performance",
            PerformanceMode::Sampler => "Sampler",
        }
    }

    /// Moves `steps` modes along, wrapping at both ends.
    pub fn step(self, steps: i32) -> PerformanceMode {
        let index = (self as i32 + steps).rem_euclid(Self::COUNT as i32);
        num::FromPrimitive::from_i32(index).unwrap_or(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Mode(PerformanceMode),
    Subtype(u8),
    Shift(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeState {
    mode: PerformanceMode,
    subtype: u8,
    shift_held: bool,
}

impl ModeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> PerformanceMode {
        self.mode
    }

    pub fn subtype(&self) -> u8 {
        self.subtype
    }

    pub fn shift_held(&self) -> bool {
        self.shift_held
    }

    /// Applies a controller move if it belongs to the mode controls.
    ///
    /// The main encoder sends 65 for a click clockwise and 63 anticlockwise;
    /// other values are ignored. The encoder press advances the subtype on
    /// press only.
    pub fn handle(&mut self, controller: u8, value: u8) -> Option<ModeChange> {
        let change = match controller {
            MODE_ENCODER_CC => {
                let steps = match value {
                    65 => 1,
                    63 => -1,
                    _ => return None,
                };
                self.mode = self.mode.step(steps);
                ModeChange::Mode(self.mode)
            }
            MODE_ENCODER_PRESS if value > 0 => {
                self.subtype = (self.subtype + 1) % SUBTYPE_COUNT;
                ModeChange::Subtype(self.subtype)
            }
            SHIFT_CC => {
                let held = value >= 64;
                if held == self.shift_held {
                    return None;
                }
                self.shift_held = held;
                ModeChange::Shift(held)
            }
            _ => return None,
        };
        debug!(?change, "mode control");
        Some(change)
    }
}
