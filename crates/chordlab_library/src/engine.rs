//! Chord performance on top of the control router.
//!
//! Pads pick the chord quality, keyboard notes that no control claims are
//! chord roots, and the modifier parameters shape the voicing. Unbound
//! controller moves on the main encoder and Shift drive the performance mode.

use crate::chord::{ChordModifiers, ChordType, generate_voicing, note_name};
use crate::controls::ParamKey;
use crate::message::{self, MidiEvent};
use crate::mode::{ModeChange, ModeState, PerformanceMode};
use crate::router::{ControlRouter, Routed};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub velocity: u8,
    pub channel: u8,
    /// Keep chords sounding after key release until the next chord starts.
    pub latch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            velocity: 96,
            channel: 0,
            latch: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EngineOutput {
    pub routed: Option<Routed>,
    /// Chord traffic for the instrument port.
    pub notes: Vec<[u8; 3]>,
    /// SysEx and CC frames for the controller.
    pub feedback: Vec<Vec<u8>>,
}

pub struct ChordEngine {
    router: ControlRouter,
    config: EngineConfig,
    chord: ChordType,
    mode: ModeState,
    /// Voicing sounded for each held root.
    sounding: BTreeMap<u8, Vec<u8>>,
    /// How many sounding chords hold each note.
    held: BTreeMap<u8, usize>,
}

impl ChordEngine {
    pub fn new(router: ControlRouter, config: EngineConfig) -> Self {
        Self {
            router,
            config,
            chord: ChordType::Major,
            mode: ModeState::new(),
            sounding: BTreeMap::new(),
            held: BTreeMap::new(),
        }
    }

    pub fn router(&self) -> &ControlRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ControlRouter {
        &mut self.router
    }

    pub fn chord(&self) -> ChordType {
        self.chord
    }

    pub fn mode(&self) -> PerformanceMode {
        self.mode.mode()
    }

    pub fn subtype(&self) -> u8 {
        self.mode.subtype()
    }

    pub fn shift_held(&self) -> bool {
        self.mode.shift_held()
    }

    pub fn sounding(&self) -> impl Iterator<Item = (&u8, &Vec<u8>)> {
        self.sounding.iter()
    }

    pub fn modifiers(&self) -> ChordModifiers {
        let params = self.router.params();
        ChordModifiers {
            complexity: params.stop_index(ParamKey::Complexity).unwrap_or(0),
            spread: params.get(ParamKey::Spread),
            octave: params.stop_index(ParamKey::Octave).unwrap_or(0),
            tension: params.stop_index(ParamKey::Tension).unwrap_or(0),
        }
    }

    /// Routes one raw frame; non-control traffic produces empty output.
    pub fn process_frame(&mut self, frame: &[u8], timestamp: u64) -> EngineOutput {
        match message::decode(frame, timestamp) {
            Some(event) => self.process(&event),
            None => EngineOutput::default(),
        }
    }

    pub fn process(&mut self, event: &MidiEvent) -> EngineOutput {
        let routed = self.router.handle(event);
        let mut output = EngineOutput {
            feedback: routed.feedback,
            ..Default::default()
        };

        match routed.routed {
            Routed::PadTriggered { pad, .. } => {
                if let Some(chord) = ChordType::from_pad(pad) {
                    self.chord = chord;
                    output
                        .feedback
                        .extend(self.router.show_text("Chord", chord.name()));
                }
            }
            Routed::Unmatched(MidiEvent::NoteOn { note, .. }) => {
                self.start_chord(note, &mut output);
            }
            Routed::Unmatched(MidiEvent::NoteOff { note, .. }) if !self.config.latch => {
                self.release(note, &mut output.notes);
            }
            Routed::Unmatched(MidiEvent::ControlChange {
                controller, value, ..
            }) => {
                let text = match self.mode.handle(controller, value) {
                    Some(ModeChange::Mode(mode)) => Some(("Mode".to_string(), mode.name().to_string())),
                    Some(ModeChange::Subtype(subtype)) => Some((
                        self.mode.mode().name().to_string(),
                        format!("Variant {}", subtype + 1),
                    )),
                    _ => None,
                };
                if let Some((line1, line2)) = text {
                    output.feedback.extend(self.router.show_text(&line1, &line2));
                }
            }
            _ => {}
        }

        output.routed = Some(routed.routed);
        output
    }

    /// Note-offs for everything currently sounding.
    pub fn all_notes_off(&mut self) -> Vec<[u8; 3]> {
        let mut notes = Vec::new();
        let roots: Vec<u8> = self.sounding.keys().copied().collect();
        for root in roots {
            self.release(root, &mut notes);
        }
        notes
    }

    fn start_chord(&mut self, root: u8, output: &mut EngineOutput) {
        if self.config.latch {
            output.notes.extend(self.all_notes_off());
        } else {
            self.release(root, &mut output.notes);
        }

        let voicing = generate_voicing(self.chord, root, &self.modifiers());
        debug!(root, chord = self.chord.name(), ?voicing, "chord on");
        let channel = self.config.channel;
        let velocity = self.config.velocity as i32;
        for &note in &voicing {
            *self.held.entry(note).or_default() += 1;
            output.notes.push(message::note_on_frame(channel, note, velocity));
        }

        let line1 = format!("{}{}", note_name(root), self.chord.name());
        let line2 = format!("{} notes", voicing.len());
        output.feedback.extend(self.router.show_text(&line1, &line2));
        self.sounding.insert(root, voicing);
    }

    /// Releases the chord on `root`. Notes another sounding chord still
    /// holds keep playing.
    fn release(&mut self, root: u8, notes: &mut Vec<[u8; 3]>) {
        let Some(voicing) = self.sounding.remove(&root) else {
            return;
        };
        let channel = self.config.channel;
        for note in voicing {
            let Some(count) = self.held.get_mut(&note) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                self.held.remove(&note);
                notes.push(message::note_off_frame(channel, note, 0));
            }
        }
    }
}
