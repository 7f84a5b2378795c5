//! Control-surface layer for the ChordLab MiniLab 3 driver.
//!
//! Raw MIDI frames are decoded ([`message`]), resolved against a persistent
//! binding table ([`bindings`]) by the [`router`], which owns the chord
//! modifier [`params`] and answers with OLED ([`screen`]) and pad colour
//! ([`lights`]) SysEx. Relative encoders are classified on the fly by
//! [`encoder`]. The [`engine`] turns the routed result into chords and
//! follows the performance [`mode`] controls.

pub mod bindings;
pub mod chord;
pub mod controls;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod lights;
pub mod message;
pub mod mode;
pub mod params;
pub mod persistence;
pub mod router;
pub mod screen;

pub use error::{Error, Result};
