//! Raw MIDI frames in, typed control events out.
//!
//! Only the three channel-voice messages a control surface produces are
//! decoded. Everything else (system messages, running status, truncated
//! frames) is not a control message and decodes to `None`.

use std::fmt;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
const SYSTEM: u8 = 0xF0;

/// A decoded control message. `timestamp` is whatever monotonic clock the
/// transport stamps frames with (midir uses microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
        timestamp: u64,
    },
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
        timestamp: u64,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
        timestamp: u64,
    },
}

impl MidiEvent {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. } => channel,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match *self {
            MidiEvent::NoteOn { timestamp, .. }
            | MidiEvent::NoteOff { timestamp, .. }
            | MidiEvent::ControlChange { timestamp, .. } => timestamp,
        }
    }

    pub fn is_note(&self) -> bool {
        !matches!(self, MidiEvent::ControlChange { .. })
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
                ..
            } => write!(f, "note_on channel={channel} note={note} velocity={velocity}"),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
                ..
            } => write!(f, "note_off channel={channel} note={note} velocity={velocity}"),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
                ..
            } => write!(f, "control_change channel={channel} control={controller} value={value}"),
        }
    }
}

/// Space-separated upper-case hex, e.g. `90 3C 64`.
pub fn hex(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes one status-prefixed frame.
pub fn decode(message: &[u8], timestamp: u64) -> Option<MidiEvent> {
    let (&status, data) = message.split_first()?;

    // Running status and system traffic are not ours.
    if status < NOTE_OFF || status >= SYSTEM {
        return None;
    }

    let channel = status & 0x0F;
    let kind = status & 0xF0;
    if !matches!(kind, NOTE_OFF | NOTE_ON | CONTROL_CHANGE) || data.len() < 2 {
        return None;
    }

    let data1 = data[0] & 0x7F;
    let data2 = data[1] & 0x7F;

    let event = match kind {
        NOTE_ON if data2 > 0 => MidiEvent::NoteOn {
            channel,
            note: data1,
            velocity: data2,
            timestamp,
        },
        NOTE_ON | NOTE_OFF => MidiEvent::NoteOff {
            channel,
            note: data1,
            velocity: data2,
            timestamp,
        },
        _ => MidiEvent::ControlChange {
            channel,
            controller: data1,
            value: data2,
            timestamp,
        },
    };
    Some(event)
}

fn clamp_7bit(value: i32) -> u8 {
    value.clamp(0, 127) as u8
}

pub fn note_on_frame(channel: u8, note: u8, velocity: i32) -> [u8; 3] {
    [NOTE_ON | (channel & 0x0F), note & 0x7F, clamp_7bit(velocity)]
}

pub fn note_off_frame(channel: u8, note: u8, velocity: i32) -> [u8; 3] {
    [NOTE_OFF | (channel & 0x0F), note & 0x7F, clamp_7bit(velocity)]
}

pub fn control_change_frame(channel: u8, controller: u8, value: i32) -> [u8; 3] {
    [
        CONTROL_CHANGE | (channel & 0x0F),
        controller & 0x7F,
        clamp_7bit(value),
    ]
}
