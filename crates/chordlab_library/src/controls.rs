use crate::encoder::EncoderMode;
use crate::error::{Error, Result};
use crate::message::MidiEvent;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The four chord modifiers a fader or encoder can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKey {
    Complexity = 0,
    Spread = 1,
    Octave = 2,
    Tension = 3,
}

impl ParamKey {
    pub const ALL: [ParamKey; 4] = [
        ParamKey::Complexity,
        ParamKey::Spread,
        ParamKey::Octave,
        ParamKey::Tension,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ParamKey::Complexity => "complexity",
            ParamKey::Spread => "spread",
            ParamKey::Octave => "octave",
            ParamKey::Tension => "tension",
        }
    }

    /// Label shown on the OLED.
    pub fn label(self) -> &'static str {
        match self {
            ParamKey::Complexity => "Complexity",
            ParamKey::Spread => "Spread",
            ParamKey::Octave => "Octave Dbl",
            ParamKey::Tension => "Tension",
        }
    }
}

impl FromStr for ParamKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParamKey::ALL
            .into_iter()
            .find(|key| key.id() == s)
            .ok_or_else(|| Error::InvalidControl(s.to_string()))
    }
}

/// Application-level identity of a control, independent of MIDI numbers.
///
/// The string form (`pad:3`, `slider:spread`, `encoder:86`) is the key of the
/// persisted override record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalControl {
    Pad(u8),
    Slider(ParamKey),
    /// Keyed by the encoder's factory controller number.
    Encoder(u8),
}

impl LogicalControl {
    pub fn is_encoder(&self) -> bool {
        matches!(self, LogicalControl::Encoder(_))
    }
}

impl fmt::Display for LogicalControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalControl::Pad(index) => write!(f, "pad:{index}"),
            LogicalControl::Slider(key) => write!(f, "slider:{}", key.id()),
            LogicalControl::Encoder(controller) => write!(f, "encoder:{controller}"),
        }
    }
}

impl FromStr for LogicalControl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidControl(s.to_string());
        let (kind, id) = s.trim().split_once(':').ok_or_else(invalid)?;
        let number = || id.parse::<u8>().ok().filter(|n| *n < 128).ok_or_else(invalid);
        match kind {
            "pad" => Ok(LogicalControl::Pad(number()?)),
            "slider" => Ok(LogicalControl::Slider(id.parse().map_err(|_| invalid())?)),
            "encoder" => Ok(LogicalControl::Encoder(number()?)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for LogicalControl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalControl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The MIDI note or controller a logical control currently answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PhysicalBinding {
    Note {
        note: u8,
        channel: u8,
    },
    ControlChange {
        controller: u8,
        channel: u8,
        /// Manual override of the inferred encoder encoding.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encoder_mode: Option<EncoderMode>,
        /// Parameter an encoder drives.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ParamKey>,
    },
}

impl PhysicalBinding {
    pub fn note(channel: u8, note: u8) -> Self {
        PhysicalBinding::Note { note, channel }
    }

    pub fn cc(channel: u8, controller: u8) -> Self {
        PhysicalBinding::ControlChange {
            controller,
            channel,
            encoder_mode: None,
            target: None,
        }
    }

    pub fn encoder(channel: u8, controller: u8, target: Option<ParamKey>) -> Self {
        PhysicalBinding::ControlChange {
            controller,
            channel,
            encoder_mode: None,
            target,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            PhysicalBinding::Note { channel, .. } | PhysicalBinding::ControlChange { channel, .. } => {
                channel
            }
        }
    }

    pub fn target(&self) -> Option<ParamKey> {
        match *self {
            PhysicalBinding::ControlChange { target, .. } => target,
            PhysicalBinding::Note { .. } => None,
        }
    }

    pub fn encoder_mode(&self) -> Option<EncoderMode> {
        match *self {
            PhysicalBinding::ControlChange { encoder_mode, .. } => encoder_mode,
            PhysicalBinding::Note { .. } => None,
        }
    }

    /// Checks the binding is well formed for the control it is attached to.
    pub fn validate_for(&self, control: &LogicalControl) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidBinding {
            control: control.to_string(),
            reason: reason.to_string(),
        };
        let (number, channel) = match *self {
            PhysicalBinding::Note { note, channel } => (note, channel),
            PhysicalBinding::ControlChange {
                controller,
                channel,
                ..
            } => (controller, channel),
        };
        if number > 127 {
            return Err(invalid("note/controller must be 0 to 127"));
        }
        if channel > 15 {
            return Err(invalid("channel must be 0 to 15"));
        }
        match (control, self) {
            (LogicalControl::Pad(_), PhysicalBinding::Note { .. }) => Ok(()),
            (LogicalControl::Pad(_), _) => Err(invalid("pads bind to notes")),
            (_, PhysicalBinding::Note { .. }) => Err(invalid("sliders and encoders bind to controllers")),
            _ => Ok(()),
        }
    }
}

/// Turns a just-observed event into a candidate binding for learn mode.
///
/// Note-ons become note bindings and controller moves become bare controller
/// bindings (no mode, no target); releases are ignored so the tail of a
/// previous press is never captured.
pub fn capture_from_event(event: &MidiEvent) -> Option<PhysicalBinding> {
    match *event {
        MidiEvent::NoteOn { channel, note, .. } => Some(PhysicalBinding::note(channel, note)),
        MidiEvent::ControlChange {
            channel,
            controller,
            ..
        } => Some(PhysicalBinding::cc(channel, controller)),
        MidiEvent::NoteOff { .. } => None,
    }
}
