use chordlab_library::controls::ParamKey;
use chordlab_library::lights::{DEFAULT_PAD_LED_BASE, PAD_COUNT};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Deserialize, Debug)]
#[serde(default)]
pub(crate) struct Settings {
    pub client_name: String,
    /// Controller input. Case-insensitive substring of the port name; empty
    /// picks the first port that looks like a MiniLab.
    pub input_port: String,
    /// Where chords go. Empty picks a loopback bus if one exists, else a
    /// virtual port named `output_port_name` is created.
    pub output_port: String,
    /// Controller output for OLED/pad/CC feedback. Empty picks the MiniLab.
    pub feedback_port: String,
    pub output_port_name: String,
    pub velocity: u8,
    pub channel: u8,
    /// Keep chords sounding after the key is released.
    pub latch: bool,
    pub self_test: bool,
    /// LED id of pad 0 in the pad colour SysEx.
    pub pad_led_base: u8,
    /// Directory holding the bindings file. Empty means the platform config dir.
    pub bindings_dir: String,
    /// Parameter values (0.0 - 1.0) applied at startup, e.g. `spread = 0.5`.
    pub initial_params: BTreeMap<String, f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_name: "ChordLab".to_string(),
            input_port: "".to_string(),
            output_port: "".to_string(),
            feedback_port: "".to_string(),
            output_port_name: "ChordLab Out".to_string(),
            velocity: 96,
            channel: 0,
            latch: false,
            self_test: true,
            pad_led_base: DEFAULT_PAD_LED_BASE,
            bindings_dir: "".to_string(),
            initial_params: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.client_name.is_empty() {
            return Err("Client name must not be empty".to_string());
        }

        if self.output_port_name.is_empty() {
            return Err("Output port name must not be empty".to_string());
        }

        if !(1..=127).contains(&self.velocity) {
            return Err(format!("velocity must be 1 to 127 (found {})", self.velocity));
        }

        if self.channel > 15 {
            return Err(format!("channel must be 0 to 15 (found {})", self.channel));
        }

        if self.pad_led_base as usize + PAD_COUNT > 128 {
            return Err(format!(
                "pad_led_base leaves no room for {PAD_COUNT} pads (found {})",
                self.pad_led_base
            ));
        }

        for (key, value) in &self.initial_params {
            key.parse::<ParamKey>().map_err(|e| e.to_string())?;
            if !(0.0..=1.0).contains(value) {
                return Err(format!("initial_params.{key} must be 0.0 to 1.0 (found {value})"));
            }
        }

        Ok(())
    }

    /// Startup parameter values in a fixed order. Call after `validate`.
    pub(crate) fn initial_params(&self) -> Vec<(ParamKey, f32)> {
        let mut params: Vec<(ParamKey, f32)> = self
            .initial_params
            .iter()
            .filter_map(|(key, value)| key.parse().ok().map(|key| (key, *value)))
            .collect();
        params.sort_by_key(|(key, _)| *key as u8);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(Settings::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let settings = Settings {
            velocity: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            channel: 16,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            pad_led_base: 0x7C,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_initial_params() {
        let mut settings = Settings::default();
        settings.initial_params.insert("tension".to_string(), 1.0);
        settings.initial_params.insert("spread".to_string(), 0.25);
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(
            settings.initial_params(),
            vec![(ParamKey::Spread, 0.25), (ParamKey::Tension, 1.0)]
        );

        settings.initial_params.insert("volume".to_string(), 0.5);
        assert!(settings.validate().is_err());
    }
}
