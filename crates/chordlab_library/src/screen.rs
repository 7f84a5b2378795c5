use crate::lights::SYSEX_END;

/// F0, Arturia manufacturer id, MiniLab 3 device/command bytes for "two text lines".
const HEADER: [u8; 10] = [0xF0, 0x00, 0x20, 0x6B, 0x7F, 0x42, 0x04, 0x02, 0x60, 0x01];

pub const LINE_WIDTH: usize = 16;

fn encode_line(text: &str) -> [u8; LINE_WIDTH] {
    let mut line = [b' '; LINE_WIDTH];
    let printable = text
        .chars()
        .take(LINE_WIDTH)
        .filter(|c| matches!(c, ' '..='~'));
    for (slot, ch) in line.iter_mut().zip(printable) {
        *slot = (ch as u8) & 0x7F;
    }
    line
}

/// SysEx frame showing two 16-character lines on the OLED.
pub fn oled_packet(line1: &str, line2: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER.len() + 2 * LINE_WIDTH + 1);
    packet.extend_from_slice(&HEADER);
    packet.extend_from_slice(&encode_line(line1));
    packet.extend_from_slice(&encode_line(line2));
    packet.push(SYSEX_END);
    packet
}

/// The two lines currently on the OLED.
#[derive(Debug, Default)]
pub struct Screen {
    lines: [String; 2],
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.lines = [String::new(), String::new()];
    }

    pub fn get(&self, line: usize) -> &str {
        self.lines.get(line).map(String::as_str).unwrap_or("")
    }

    /// Returns true when the text actually changed.
    pub fn set(&mut self, line1: &str, line2: &str) -> bool {
        if self.lines[0] == line1 && self.lines[1] == line2 {
            return false;
        }
        self.lines = [line1.to_string(), line2.to_string()];
        true
    }

    pub fn packet(&self) -> Vec<u8> {
        oled_packet(&self.lines[0], &self.lines[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_line(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).trim_end().to_string()
    }

    #[test]
    fn test_oled_layout() {
        let packet = oled_packet("Cmaj7", "Spread 40%");
        assert_eq!(packet.len(), 10 + 32 + 1);
        assert_eq!(&packet[..10], &HEADER);
        assert_eq!(&packet[10..15], b"Cmaj7");
        assert_eq!(&packet[15..26], &[b' '; 11]);
        assert_eq!(decode_line(&packet[26..42]), "Spread 40%");
        assert_eq!(*packet.last().unwrap(), 0xF7);
    }

    #[test]
    fn test_truncates_and_strips() {
        let packet = oled_packet("a\tb\u{e9}c\x7f", "0123456789abcdefXYZ");
        assert_eq!(decode_line(&packet[10..26]), "abc");
        assert_eq!(&packet[26..42], b"0123456789abcdef");
    }

    #[test]
    fn test_truncates_before_stripping() {
        let line = format!("{}ABC", "\t".repeat(16));
        let packet = oled_packet(&line, "Chord\u{1}maj");
        assert_eq!(&packet[10..26], &[b' '; LINE_WIDTH]);
        assert_eq!(decode_line(&packet[26..42]), "Chordmaj");
    }

    #[test]
    fn test_screen_tracks_changes() {
        let mut screen = Screen::default();
        assert_eq!(screen.packet(), oled_packet("", ""));
        assert!(screen.set("Chord", "maj"));
        assert!(!screen.set("Chord", "maj"));
        assert_eq!(screen.get(1), "maj");
        assert_eq!(screen.packet(), oled_packet("Chord", "maj"));
        screen.reset();
        assert_eq!(screen.get(0), "");
    }

    proptest! {
        #[test]
        fn printable_lines_survive(line in "[ -~]{0,16}") {
            let packet = oled_packet(&line, "");
            prop_assert_eq!(decode_line(&packet[10..26]), line.trim_end().to_string());
        }
    }
}
