//! The binding table between logical controls and MIDI numbers.
//!
//! Defaults are compiled in; the store persists only the entries that differ
//! from them, so a change to the factory layout reaches every user who never
//! touched that control. Lookups by incoming (channel, number) go through a
//! reverse index rebuilt on every mutation.

use crate::controls::{LogicalControl, ParamKey, PhysicalBinding};
use crate::error::Result;
use crate::persistence::{BindingPersistence, Overrides, PersistedBindings};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

/// Notes 36-43 on channel index 8 for pads 0-7.
const DEFAULT_PAD_CHANNEL: u8 = 8;
const DEFAULT_PAD_NOTES: [u8; 8] = [36, 37, 38, 39, 40, 41, 42, 43];
const DEFAULT_SLIDERS: [(ParamKey, u8); 4] = [
    (ParamKey::Complexity, 14),
    (ParamKey::Spread, 15),
    (ParamKey::Octave, 30),
    (ParamKey::Tension, 31),
];
const DEFAULT_ENCODERS: [u8; 8] = [86, 87, 89, 90, 110, 111, 116, 117];

pub type BindingTable = BTreeMap<LogicalControl, PhysicalBinding>;

/// The MiniLab 3 factory layout.
pub fn default_bindings() -> BindingTable {
    let mut table = BindingTable::new();
    for (index, note) in DEFAULT_PAD_NOTES.into_iter().enumerate() {
        table.insert(
            LogicalControl::Pad(index as u8),
            PhysicalBinding::note(DEFAULT_PAD_CHANNEL, note),
        );
    }
    for (key, controller) in DEFAULT_SLIDERS {
        table.insert(LogicalControl::Slider(key), PhysicalBinding::cc(0, controller));
    }
    for (index, controller) in DEFAULT_ENCODERS.into_iter().enumerate() {
        table.insert(
            LogicalControl::Encoder(controller),
            PhysicalBinding::encoder(0, controller, ParamKey::ALL.get(index).copied()),
        );
    }
    table
}

/// Sent to subscribers after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingsChanged {
    Set(LogicalControl),
    /// `None` when every control was reset.
    Reset(Option<LogicalControl>),
    TargetChanged {
        controller: u8,
        target: Option<ParamKey>,
    },
}

#[derive(Debug, Default)]
struct ReverseIndex {
    notes: HashMap<(u8, u8), LogicalControl>,
    sliders: HashMap<(u8, u8), LogicalControl>,
    encoders: HashMap<(u8, u8), LogicalControl>,
}

impl ReverseIndex {
    fn build(table: &BindingTable) -> Self {
        let mut index = ReverseIndex::default();
        for (control, binding) in table {
            let map = match control {
                LogicalControl::Pad(_) => &mut index.notes,
                LogicalControl::Slider(_) => &mut index.sliders,
                LogicalControl::Encoder(_) => &mut index.encoders,
            };
            let number = match *binding {
                PhysicalBinding::Note { note, .. } => note,
                PhysicalBinding::ControlChange { controller, .. } => controller,
            };
            // BTreeMap iteration order makes duplicate resolution stable.
            map.entry((binding.channel(), number)).or_insert(*control);
        }
        index
    }
}

pub struct BindingStore {
    defaults: BindingTable,
    current: BindingTable,
    index: ReverseIndex,
    persistence: Box<dyn BindingPersistence>,
    subscribers: Vec<Sender<BindingsChanged>>,
    persistence_fault: Option<String>,
}

impl BindingStore {
    /// Loads overrides on top of the factory defaults.
    pub fn load(persistence: Box<dyn BindingPersistence>) -> Self {
        Self::with_defaults(default_bindings(), persistence)
    }

    /// Loads overrides on top of `defaults`. A record that cannot be read or
    /// parsed is logged and ignored.
    pub fn with_defaults(defaults: BindingTable, persistence: Box<dyn BindingPersistence>) -> Self {
        let mut current = defaults.clone();
        match persistence.load() {
            Ok(Some(record)) => {
                let mut applied = 0;
                for (control, binding) in record.overrides {
                    if let Err(e) = binding.validate_for(&control) {
                        warn!("Ignoring stored binding: {e}");
                        continue;
                    }
                    current.insert(control, binding);
                    applied += 1;
                }
                info!(applied, "Loaded binding overrides");
            }
            Ok(None) => debug!("No stored binding overrides; using defaults"),
            Err(e) => warn!("Stored bindings unreadable, using defaults: {e}"),
        }
        let index = ReverseIndex::build(&current);
        Self {
            defaults,
            current,
            index,
            persistence,
            subscribers: Vec::new(),
            persistence_fault: None,
        }
    }

    pub fn get_binding(&self, control: &LogicalControl) -> Option<&PhysicalBinding> {
        self.current.get(control)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LogicalControl, &PhysicalBinding)> {
        self.current.iter()
    }

    pub fn defaults(&self) -> &BindingTable {
        &self.defaults
    }

    /// Replaces a binding. An encoder relearn that only supplies a new
    /// controller keeps the parameter the old binding targeted. A binding of
    /// the wrong form for `control` is rejected and nothing changes.
    pub fn set_binding(&mut self, control: LogicalControl, binding: PhysicalBinding) -> Result<()> {
        binding.validate_for(&control)?;
        let binding = match (self.current.get(&control), binding) {
            (
                Some(PhysicalBinding::ControlChange {
                    target: Some(previous),
                    ..
                }),
                PhysicalBinding::ControlChange {
                    controller,
                    channel,
                    encoder_mode,
                    target: None,
                },
            ) => PhysicalBinding::ControlChange {
                controller,
                channel,
                encoder_mode,
                target: Some(*previous),
            },
            (_, binding) => binding,
        };
        info!(%control, ?binding, "Binding set");
        self.current.insert(control, binding);
        self.changed(BindingsChanged::Set(control));
        Ok(())
    }

    /// Restores one control, or every control, to its default.
    pub fn reset_binding(&mut self, control: Option<&LogicalControl>) {
        match control {
            Some(control) => {
                match self.defaults.get(control) {
                    Some(default) => {
                        self.current.insert(*control, *default);
                    }
                    None => {
                        self.current.remove(control);
                    }
                }
                info!(%control, "Binding reset");
            }
            None => {
                self.current = self.defaults.clone();
                info!("All bindings reset");
            }
        }
        self.changed(BindingsChanged::Reset(control.copied()));
    }

    /// Retargets every encoder bound to `controller`. Does nothing when no
    /// encoder uses that controller.
    pub fn set_encoder_target(&mut self, controller: u8, target: Option<ParamKey>) {
        let mut touched = false;
        for (control, binding) in self.current.iter_mut() {
            if !control.is_encoder() {
                continue;
            }
            if let PhysicalBinding::ControlChange {
                controller: bound,
                target: slot,
                ..
            } = binding
            {
                if *bound == controller {
                    *slot = target;
                    touched = true;
                }
            }
        }
        if touched {
            info!(controller, ?target, "Encoder target changed");
            self.changed(BindingsChanged::TargetChanged { controller, target });
        }
    }

    pub fn pad_for_note(&self, channel: u8, note: u8) -> Option<u8> {
        match self.index.notes.get(&(channel, note)) {
            Some(LogicalControl::Pad(index)) => Some(*index),
            _ => None,
        }
    }

    pub fn slider_for_cc(&self, channel: u8, controller: u8) -> Option<ParamKey> {
        match self.index.sliders.get(&(channel, controller)) {
            Some(LogicalControl::Slider(key)) => Some(*key),
            _ => None,
        }
    }

    pub fn encoder_for_cc(&self, channel: u8, controller: u8) -> Option<(LogicalControl, PhysicalBinding)> {
        let control = self.index.encoders.get(&(channel, controller))?;
        self.current.get(control).map(|binding| (*control, *binding))
    }

    /// Every slider binding that drives `key`.
    pub fn sliders_for(&self, key: ParamKey) -> impl Iterator<Item = &PhysicalBinding> {
        self.current
            .iter()
            .filter(move |(control, _)| **control == LogicalControl::Slider(key))
            .map(|(_, binding)| binding)
    }

    /// Entries that differ from the defaults.
    pub fn overrides(&self) -> Overrides {
        self.current
            .iter()
            .filter(|(control, binding)| self.defaults.get(control) != Some(binding))
            .map(|(control, binding)| (*control, *binding))
            .collect()
    }

    pub fn subscribe(&mut self) -> Receiver<BindingsChanged> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// The first persistence failure, kept until a later write succeeds.
    pub fn persistence_fault(&self) -> Option<&str> {
        self.persistence_fault.as_deref()
    }

    fn changed(&mut self, change: BindingsChanged) {
        self.index = ReverseIndex::build(&self.current);
        self.persist();
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    fn persist(&mut self) {
        let record = PersistedBindings::new(self.overrides());
        match self.persistence.save(&record) {
            Ok(()) => {
                if self.persistence_fault.take().is_some() {
                    info!("Binding overrides saved again");
                }
            }
            Err(e) if self.persistence_fault.is_none() => {
                error!("Could not save binding overrides: {e}");
                self.persistence_fault = Some(e.to_string());
            }
            Err(e) => debug!("Binding overrides still not saved: {e}"),
        }
    }
}
