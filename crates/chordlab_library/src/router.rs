//! Resolves decoded events against the binding table and owns every write to
//! parameter state.
//!
//! Per event, in order: a pending learn capture consumes it; otherwise a note
//! is matched against pads, and a controller move against sliders and then
//! encoders. The first structural match wins, so a controller number bound
//! as both a slider and an encoder behaves as a slider.

use crate::bindings::{BindingStore, BindingsChanged};
use crate::controls::{LogicalControl, ParamKey, PhysicalBinding, capture_from_event};
use crate::encoder::{EncoderInferrer, EncoderMode};
use crate::error::Result;
use crate::lights::{Lights, PAD_COUNT, PadColors};
use crate::message::{self, MidiEvent};
use crate::params::{ENCODER_SENSITIVITY, Origin, ParamChange, ParameterState};
use crate::screen::Screen;
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// A learn capture consumed the event.
    Learned {
        control: LogicalControl,
        binding: PhysicalBinding,
    },
    PadTriggered {
        pad: u8,
        velocity: u8,
    },
    /// Pads are momentary triggers; a release changes nothing.
    PadReleased {
        pad: u8,
    },
    Parameter(ParamChange),
    /// Matched a slider or encoder but the parameter did not move.
    Unchanged(LogicalControl),
    Unmatched(MidiEvent),
}

/// What the router decided plus the frames to send back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterOutput {
    pub routed: Routed,
    pub feedback: Vec<Vec<u8>>,
}

impl RouterOutput {
    fn quiet(routed: Routed) -> Self {
        Self {
            routed,
            feedback: Vec::new(),
        }
    }
}

pub struct ControlRouter {
    bindings: BindingStore,
    encoders: EncoderInferrer,
    params: ParameterState,
    learn: Option<LogicalControl>,
    active_pad: Option<u8>,
    screen: Screen,
    lights: Lights,
}

impl ControlRouter {
    pub fn new(bindings: BindingStore, pad_led_base: u8) -> Self {
        let mut router = Self {
            bindings,
            encoders: EncoderInferrer::new(),
            params: ParameterState::new(),
            learn: None,
            active_pad: None,
            screen: Screen::new(),
            lights: Lights::new(pad_led_base),
        };
        router.sync_encoder_overrides();
        router.paint_pads();
        router
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn params(&self) -> &ParameterState {
        &self.params
    }

    pub fn active_pad(&self) -> Option<u8> {
        self.active_pad
    }

    pub fn encoder_mode(&self, controller: u8) -> Option<EncoderMode> {
        self.encoders.mode_for(controller)
    }

    pub fn subscribe(&mut self) -> Receiver<BindingsChanged> {
        self.bindings.subscribe()
    }

    /// Arms learn mode. The next event that fits `control` (a note-on for a
    /// pad, a controller move otherwise) becomes its binding. No timeout.
    pub fn arm_learn(&mut self, control: LogicalControl) {
        info!(%control, "Learn armed");
        self.learn = Some(control);
    }

    pub fn disarm_learn(&mut self) {
        if let Some(control) = self.learn.take() {
            info!(%control, "Learn disarmed");
        }
    }

    pub fn learning(&self) -> Option<LogicalControl> {
        self.learn
    }

    /// Decodes and routes one raw frame. Non-control traffic yields `None`.
    pub fn handle_frame(&mut self, frame: &[u8], timestamp: u64) -> Option<RouterOutput> {
        message::decode(frame, timestamp).map(|event| self.handle(&event))
    }

    pub fn handle(&mut self, event: &MidiEvent) -> RouterOutput {
        if let Some(output) = self.try_learn(event) {
            return output;
        }

        match *event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
                ..
            } => match self.bindings.pad_for_note(channel, note) {
                Some(pad) => self.trigger_pad(pad, velocity),
                None => RouterOutput::quiet(Routed::Unmatched(*event)),
            },
            MidiEvent::NoteOff { channel, note, .. } => match self.bindings.pad_for_note(channel, note) {
                Some(pad) => RouterOutput::quiet(Routed::PadReleased { pad }),
                None => RouterOutput::quiet(Routed::Unmatched(*event)),
            },
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
                ..
            } => {
                if let Some(key) = self.bindings.slider_for_cc(channel, controller) {
                    let change = self.params.apply_wire(key, value, Origin::Hardware);
                    return self.parameter_output(LogicalControl::Slider(key), change);
                }
                if let Some((control, binding)) = self.bindings.encoder_for_cc(channel, controller) {
                    let reading = self.encoders.observe(controller, value);
                    debug!(controller, mode = reading.mode.name(), delta = reading.delta, "encoder");
                    let change = match binding.target() {
                        Some(key) if reading.delta != 0 => self.params.nudge(
                            key,
                            reading.delta as f32 * ENCODER_SENSITIVITY,
                            Origin::Hardware,
                        ),
                        _ => None,
                    };
                    return self.parameter_output(control, change);
                }
                RouterOutput::quiet(Routed::Unmatched(*event))
            }
        }
    }

    /// Writes a parameter from outside the hardware path (UI, startup
    /// settings). `User` writes are echoed to every slider bound to `key`;
    /// `Hardware` writes never are.
    pub fn set_parameter(&mut self, key: ParamKey, value: f32, origin: Origin) -> RouterOutput {
        let change = self.params.apply(key, value, origin);
        self.parameter_output(LogicalControl::Slider(key), change)
    }

    pub fn set_binding(&mut self, control: LogicalControl, binding: PhysicalBinding) -> Result<()> {
        let previous = self.bindings.get_binding(&control).copied();
        self.bindings.set_binding(control, binding)?;
        self.forget_encoder_history(previous, Some(binding));
        self.sync_encoder_overrides();
        Ok(())
    }

    pub fn reset_binding(&mut self, control: Option<&LogicalControl>) {
        let before: HashMap<LogicalControl, PhysicalBinding> =
            self.bindings.iter().map(|(c, b)| (*c, *b)).collect();
        self.bindings.reset_binding(control);
        let after: Vec<(LogicalControl, PhysicalBinding)> =
            self.bindings.iter().map(|(c, b)| (*c, *b)).collect();
        for (control, binding) in after {
            let previous = before.get(&control).copied();
            if previous != Some(binding) {
                self.forget_encoder_history(previous, Some(binding));
            }
        }
        self.sync_encoder_overrides();
    }

    pub fn set_encoder_target(&mut self, controller: u8, target: Option<ParamKey>) {
        self.bindings.set_encoder_target(controller, target);
    }

    /// Pins (or unpins) the encoding of an encoder binding. Does nothing for
    /// controls that are not bound to a controller.
    pub fn set_encoder_mode(&mut self, control: LogicalControl, mode: Option<EncoderMode>) -> Result<()> {
        let Some(PhysicalBinding::ControlChange {
            controller,
            channel,
            target,
            ..
        }) = self.bindings.get_binding(&control).copied()
        else {
            return Ok(());
        };
        self.bindings.set_binding(
            control,
            PhysicalBinding::ControlChange {
                controller,
                channel,
                encoder_mode: mode,
                target,
            },
        )?;
        self.sync_encoder_overrides();
        Ok(())
    }

    /// Puts text on the OLED; `None` when it is already showing.
    pub fn show_text(&mut self, line1: &str, line2: &str) -> Option<Vec<u8>> {
        self.screen.set(line1, line2).then(|| self.screen.packet())
    }

    /// Frames for a full redraw of pads and OLED.
    pub fn refresh(&mut self) -> Vec<Vec<u8>> {
        self.paint_pads();
        self.lights.invalidate();
        let mut frames = self.lights.take_packets();
        frames.push(self.screen.packet());
        frames
    }

    fn try_learn(&mut self, event: &MidiEvent) -> Option<RouterOutput> {
        let control = self.learn?;
        let binding = capture_from_event(event)?;
        // An event of the wrong kind for the armed control falls through.
        self.set_binding(control, binding).ok()?;
        self.learn = None;
        let binding = self.bindings.get_binding(&control).copied().unwrap_or(binding);
        info!(%control, ?binding, "Learned binding");

        let feedback = self
            .show_text("Learned", &control.to_string())
            .into_iter()
            .collect();
        Some(RouterOutput {
            routed: Routed::Learned { control, binding },
            feedback,
        })
    }

    fn trigger_pad(&mut self, pad: u8, velocity: u8) -> RouterOutput {
        self.active_pad = Some(pad);
        self.paint_pads();
        RouterOutput {
            routed: Routed::PadTriggered { pad, velocity },
            feedback: self.lights.take_packets(),
        }
    }

    fn paint_pads(&mut self) {
        for idx in 0..PAD_COUNT {
            let color = PadColors::nth(idx).rgb();
            let color = if self.active_pad == Some(idx as u8) {
                color
            } else {
                color.dimmed()
            };
            self.lights.set_pad(idx, color);
        }
    }

    fn parameter_output(&mut self, control: LogicalControl, change: Option<ParamChange>) -> RouterOutput {
        let Some(change) = change else {
            return RouterOutput::quiet(Routed::Unchanged(control));
        };
        debug!(param = change.key.id(), value = change.value, origin = ?change.origin, "parameter");

        let value = self.params.display_value(change.key);
        let mut feedback: Vec<Vec<u8>> = self.show_text(change.key.label(), &value).into_iter().collect();
        if change.origin == Origin::User {
            let wire = self.params.wire_value(change.key) as i32;
            for binding in self.bindings.sliders_for(change.key) {
                if let PhysicalBinding::ControlChange { controller, channel, .. } = *binding {
                    feedback.push(message::control_change_frame(channel, controller, wire).to_vec());
                }
            }
        }
        RouterOutput {
            routed: Routed::Parameter(change),
            feedback,
        }
    }

    fn forget_encoder_history(&mut self, previous: Option<PhysicalBinding>, next: Option<PhysicalBinding>) {
        for binding in [previous, next].into_iter().flatten() {
            if let PhysicalBinding::ControlChange { controller, .. } = binding {
                self.encoders.reset(controller);
            }
        }
    }

    /// Mirrors the pinned modes stored in encoder bindings into the inferrer.
    fn sync_encoder_overrides(&mut self) {
        let mut pinned: HashMap<u8, EncoderMode> = HashMap::new();
        for (control, binding) in self.bindings.iter() {
            if !control.is_encoder() {
                continue;
            }
            if let PhysicalBinding::ControlChange {
                controller,
                encoder_mode: Some(mode),
                ..
            } = *binding
            {
                pinned.insert(controller, mode);
            }
        }
        let stale: Vec<u8> = self
            .encoders
            .overridden_controllers()
            .filter(|controller| !pinned.contains_key(controller))
            .collect();
        for controller in stale {
            self.encoders.set_override(controller, None);
        }
        for (controller, mode) in pinned {
            self.encoders.set_override(controller, Some(mode));
        }
    }
}
