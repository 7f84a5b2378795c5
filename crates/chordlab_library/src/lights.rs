use num_derive::FromPrimitive;

pub const SYSEX_END: u8 = 0xF7;

/// F0, Arturia manufacturer id, MiniLab 3 device/command bytes for "pad colour".
const PAD_HEADER: [u8; 9] = [0xF0, 0x00, 0x20, 0x6B, 0x7F, 0x42, 0x02, 0x02, 0x16];

pub const PAD_COUNT: usize = 8;

/// Default LED id of pad 0; pads are consecutive.
pub const DEFAULT_PAD_LED_BASE: u8 = 0x34;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Same hue at roughly a quarter of the brightness.
    pub fn dimmed(self) -> Self {
        Self::new(self.r / 4, self.g / 4, self.b / 4)
    }
}

/// SysEx frame setting one pad's colour. Components are clamped to 0-127.
pub fn pad_color_packet(pad_id: u8, r: i32, g: i32, b: i32) -> Vec<u8> {
    let clamp = |v: i32| v.clamp(0, 127) as u8;
    let mut packet = Vec::with_capacity(PAD_HEADER.len() + 5);
    packet.extend_from_slice(&PAD_HEADER);
    packet.extend_from_slice(&[pad_id & 0x7F, clamp(r), clamp(g), clamp(b), SYSEX_END]);
    packet
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum PadColors {
    Red = 0,
    Orange,
    Yellow,
    Lime,
    Green,
    Cyan,
    Blue,
    Violet,
    Magenta,
    White,
}

impl PadColors {
    pub const COUNT: usize = 10;

    pub fn rgb(self) -> Rgb {
        match self {
            PadColors::Red => Rgb::new(127, 0, 0),
            PadColors::Orange => Rgb::new(127, 40, 0),
            PadColors::Yellow => Rgb::new(127, 110, 0),
            PadColors::Lime => Rgb::new(70, 127, 0),
            PadColors::Green => Rgb::new(0, 127, 0),
            PadColors::Cyan => Rgb::new(0, 127, 127),
            PadColors::Blue => Rgb::new(0, 0, 127),
            PadColors::Violet => Rgb::new(60, 0, 127),
            PadColors::Magenta => Rgb::new(127, 0, 100),
            PadColors::White => Rgb::new(127, 127, 127),
        }
    }

    /// Wraps around the palette.
    pub fn nth(index: usize) -> PadColors {
        num::FromPrimitive::from_usize(index % Self::COUNT).unwrap_or(PadColors::White)
    }
}

/// Colour state of the pad row; only pads that changed are re-sent.
pub struct Lights {
    led_base: u8,
    pads: [Rgb; PAD_COUNT],
    dirty: [bool; PAD_COUNT],
}

impl Lights {
    pub fn new(led_base: u8) -> Self {
        Self {
            led_base,
            pads: [Rgb::OFF; PAD_COUNT],
            dirty: [true; PAD_COUNT],
        }
    }

    pub fn reset(&mut self) {
        for idx in 0..PAD_COUNT {
            self.set_pad(idx, Rgb::OFF);
        }
    }

    /// Forces every pad to be re-sent on the next `take_packets`.
    pub fn invalidate(&mut self) {
        self.dirty = [true; PAD_COUNT];
    }

    pub fn get_pad(&self, idx: usize) -> Rgb {
        self.pads.get(idx).copied().unwrap_or(Rgb::OFF)
    }

    pub fn set_pad(&mut self, idx: usize, color: Rgb) {
        if idx >= PAD_COUNT {
            return;
        }
        if self.pads[idx] != color {
            self.pads[idx] = color;
            self.dirty[idx] = true;
        }
    }

    pub fn led_id(&self, idx: usize) -> u8 {
        self.led_base.wrapping_add(idx as u8) & 0x7F
    }

    /// Frames for every pad changed since the last call.
    pub fn take_packets(&mut self) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        for idx in 0..PAD_COUNT {
            if !self.dirty[idx] {
                continue;
            }
            self.dirty[idx] = false;
            let Rgb { r, g, b } = self.pads[idx];
            packets.push(pad_color_packet(self.led_id(idx), r as i32, g as i32, b as i32));
        }
        packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_packet_layout_and_clamping() {
        assert_eq!(
            pad_color_packet(21, -5, 130, 64),
            vec![0xF0, 0x00, 0x20, 0x6B, 0x7F, 0x42, 0x02, 0x02, 0x16, 21, 0, 127, 64, 0xF7]
        );
    }

    #[test]
    fn test_lights_only_resend_changes() {
        let mut lights = Lights::new(DEFAULT_PAD_LED_BASE);
        assert_eq!(lights.take_packets().len(), PAD_COUNT);
        assert!(lights.take_packets().is_empty());

        lights.set_pad(2, PadColors::Green.rgb());
        lights.set_pad(2, PadColors::Green.rgb());
        lights.set_pad(99, PadColors::Red.rgb());
        let packets = lights.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][9], DEFAULT_PAD_LED_BASE + 2);
        assert_eq!(&packets[0][10..13], &[0, 127, 0]);
        assert_eq!(lights.get_pad(2), PadColors::Green.rgb());

        lights.invalidate();
        assert_eq!(lights.take_packets().len(), PAD_COUNT);
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(PadColors::nth(0), PadColors::Red);
        assert_eq!(PadColors::nth(PadColors::COUNT + 1), PadColors::Orange);
        assert_eq!(PadColors::Blue.rgb().dimmed(), Rgb::new(0, 0, 31));
    }
}
