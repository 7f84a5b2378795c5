//! Normalised chord-modifier values.
//!
//! Spread is continuous. Complexity, octave doubling and tension snap to a
//! small set of stops, with a hysteresis margin so a fader parked near a
//! boundary does not flutter between two stops.

use crate::controls::ParamKey;

/// How far past the midpoint between two stops an input must travel before
/// the resolved value moves to the neighbouring stop.
pub const HYSTERESIS: f32 = 0.04;

/// Normalised change per encoder step.
pub const ENCODER_SENSITIVITY: f32 = 0.02;

const COMPLEXITY_STOPS: [f32; 4] = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
const OCTAVE_STOPS: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];
const TENSION_STOPS: [f32; 3] = [0.0, 0.5, 1.0];

/// Where a parameter write came from. Hardware-originated writes must not be
/// echoed back to the controller that sent them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Hardware,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contract {
    Continuous,
    Quantized(&'static [f32]),
}

impl ParamKey {
    pub fn contract(self) -> Contract {
        match self {
            ParamKey::Spread => Contract::Continuous,
            ParamKey::Complexity => Contract::Quantized(&COMPLEXITY_STOPS),
            ParamKey::Octave => Contract::Quantized(&OCTAVE_STOPS),
            ParamKey::Tension => Contract::Quantized(&TENSION_STOPS),
        }
    }
}

fn nearest_stop(stops: &[f32], value: f32) -> usize {
    stops
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (value - **a).abs().total_cmp(&(value - **b).abs()))
        .map(|(index, _)| index)
        .unwrap_or(0)
}

/// Snaps `incoming` to one of `stops`, staying on the stop nearest `current`
/// until `incoming` clears the boundary by [`HYSTERESIS`].
pub fn quantize(stops: &[f32], current: f32, incoming: f32) -> f32 {
    if stops.is_empty() {
        return incoming.clamp(0.0, 1.0);
    }
    let incoming = incoming.clamp(0.0, 1.0);
    let held = nearest_stop(stops, current);
    let target = nearest_stop(stops, incoming);
    if target == held {
        return stops[held];
    }

    let neighbour = if target > held { held + 1 } else { held - 1 };
    let boundary = (stops[held] + stops[neighbour]) / 2.0;
    let cleared = if target > held {
        incoming >= boundary + HYSTERESIS
    } else {
        incoming <= boundary - HYSTERESIS
    };
    if cleared { stops[target] } else { stops[held] }
}

pub fn from_wire(raw: u8) -> f32 {
    (raw & 0x7F) as f32 / 127.0
}

pub fn to_wire(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 127.0).round() as u8
}

/// A resolved parameter write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub key: ParamKey,
    pub value: f32,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slot {
    /// Value after the contract is applied.
    value: f32,
    /// Last input position before quantisation; encoder motion accumulates here.
    raw: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterState {
    slots: [Slot; 4],
}

impl ParameterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ParamKey) -> f32 {
        self.slots[key as usize].value
    }

    /// Index of the current stop for quantised parameters, `None` for spread.
    pub fn stop_index(&self, key: ParamKey) -> Option<usize> {
        match key.contract() {
            Contract::Continuous => None,
            Contract::Quantized(stops) => Some(nearest_stop(stops, self.get(key))),
        }
    }

    /// Sets a parameter from a normalised position. Returns `None` when the
    /// resolved value did not move.
    pub fn apply(&mut self, key: ParamKey, incoming: f32, origin: Origin) -> Option<ParamChange> {
        let slot = &mut self.slots[key as usize];
        let incoming = incoming.clamp(0.0, 1.0);
        slot.raw = incoming;
        let value = match key.contract() {
            Contract::Continuous => incoming,
            Contract::Quantized(stops) => quantize(stops, slot.value, incoming),
        };
        if value == slot.value {
            return None;
        }
        slot.value = value;
        Some(ParamChange { key, value, origin })
    }

    /// Sets a parameter from a 0-127 wire value.
    pub fn apply_wire(&mut self, key: ParamKey, raw: u8, origin: Origin) -> Option<ParamChange> {
        self.apply(key, from_wire(raw), origin)
    }

    /// Moves a parameter by a normalised amount relative to its raw position.
    pub fn nudge(&mut self, key: ParamKey, amount: f32, origin: Origin) -> Option<ParamChange> {
        let raw = self.slots[key as usize].raw;
        self.apply(key, raw + amount, origin)
    }

    pub fn wire_value(&self, key: ParamKey) -> u8 {
        to_wire(self.get(key))
    }

    /// Text for the second OLED line.
    pub fn display_value(&self, key: ParamKey) -> String {
        match (key.contract(), self.stop_index(key)) {
            (Contract::Quantized(stops), Some(index)) => format!("{}/{}", index, stops.len() - 1),
            _ => format!("{}%", (self.get(key) * 100.0).round() as u32),
        }
    }
}
