//! Chord qualities and the modifier transforms applied to them.

use num_derive::FromPrimitive;
use std::collections::BTreeSet;

/// Pads select a chord quality in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ChordType {
    Major = 0,
    Minor,
    Major7,
    Minor7,
    Sus2,
    Sus4,
    Diminished,
    Augmented,
}

impl ChordType {
    pub fn from_pad(pad: u8) -> Option<ChordType> {
        num::FromPrimitive::from_u8(pad)
    }

    pub fn intervals(self) -> &'static [i32] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Major7 => &[0, 4, 7, 11],
            ChordType::Minor7 => &[0, 3, 7, 10],
            ChordType::Sus2 => &[0, 2, 7],
            ChordType::Sus4 => &[0, 5, 7],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::Augmented => &[0, 4, 8],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChordType::Major => "maj",
            ChordType::Minor => "min",
            ChordType::Major7 => "maj7",
            ChordType::Minor7 => "min7",
            ChordType::Sus2 => "sus2",
            ChordType::Sus4 => "sus4",
            ChordType::Diminished => "dim",
            ChordType::Augmented => "aug",
        }
    }
}

/// Modifier positions: stop indices for the quantised ones, 0..=1 for spread.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChordModifiers {
    /// 0..=3: none, seventh, ninth, ninth + eleventh.
    pub complexity: usize,
    pub spread: f32,
    /// 0..=4: none, -12, ±12, +12, +12 & +24.
    pub octave: usize,
    /// 0..=2: none, alteration, alteration + 20.
    pub tension: usize,
}

const MAX_SPREAD: f32 = 24.0;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

pub fn note_name(note: u8) -> &'static str {
    NOTE_NAMES[(note % 12) as usize]
}

fn apply_spread(spread: f32, intervals: &[i32]) -> Vec<i32> {
    let step = (spread.clamp(0.0, 1.0) * MAX_SPREAD).round() as i32;
    intervals
        .iter()
        .enumerate()
        .map(|(index, interval)| interval + index as i32 * step)
        .collect()
}

fn apply_complexity(level: usize, chord: ChordType, mut intervals: Vec<i32>) -> Vec<i32> {
    match level {
        0 => {}
        1 => match chord {
            ChordType::Major => intervals.push(11),
            ChordType::Minor | ChordType::Sus2 | ChordType::Sus4 => intervals.push(10),
            _ => {}
        },
        2 => intervals.push(14),
        _ => intervals.extend([14, 17]),
    }
    intervals
}

fn apply_octaves(level: usize, mut intervals: Vec<i32>) -> Vec<i32> {
    let base = intervals.clone();
    let shifted = |offset: i32| base.iter().map(move |i| i + offset);
    match level {
        0 => {}
        1 => intervals.extend(shifted(-12)),
        2 => {
            intervals.extend(shifted(12));
            intervals.extend(shifted(-12));
        }
        3 => intervals.extend(shifted(12)),
        _ => {
            intervals.extend(shifted(12));
            intervals.extend(shifted(24));
        }
    }
    intervals
}

fn apply_tension(level: usize, chord: ChordType, mut intervals: Vec<i32>) -> Vec<i32> {
    if level == 0 {
        return intervals;
    }
    intervals.push(match chord {
        ChordType::Major | ChordType::Major7 | ChordType::Sus4 => 6,
        ChordType::Minor | ChordType::Minor7 => 13,
        _ => 8,
    });
    if level >= 2 {
        intervals.push(20);
    }
    intervals
}

/// Ordered, de-duplicated notes for `chord` on `root` with modifiers applied.
pub fn generate_voicing(chord: ChordType, root: u8, modifiers: &ChordModifiers) -> Vec<u8> {
    let intervals = apply_spread(modifiers.spread, chord.intervals());
    let intervals = apply_complexity(modifiers.complexity, chord, intervals);
    let intervals = apply_octaves(modifiers.octave, intervals);
    let intervals = apply_tension(modifiers.tension, chord, intervals);
    intervals
        .into_iter()
        .map(|interval| (root as i32 + interval).clamp(0, 127) as u8)
        .collect::<BTreeSet<u8>>()
        .into_iter()
        .collect()
}
