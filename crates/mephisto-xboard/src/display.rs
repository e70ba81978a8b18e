//! LCD decoding.
//!
//! The firmware refreshes its four-digit LCD through a shift register,
//! writing one segment byte per digit in a sweep of slots 3, 2, 1, 0.
//! [`DisplayDecoder`] turns those writes into [`DisplayText`] frames and
//! keeps the last stable frame the bridge reasons about.

use std::fmt;

/// Glyph used for segment patterns with no character equivalent.
pub const UNKNOWN_GLYPH: u8 = b'!';

const fn build_segment_table() -> [u8; 128] {
    let mut t = [UNKNOWN_GLYPH; 128];
    t[0] = b' ';
    t[6] = b'1';
    t[7] = b'7';
    t[8] = b'_';
    t[48] = b'I';
    t[49] = b'T';
    t[55] = b'M';
    t[56] = b'L';
    t[57] = b'C';
    t[61] = b'G';
    t[62] = b'U';
    t[63] = b'0';
    t[64] = b'-';
    t[79] = b'3';
    t[80] = b'r';
    t[83] = b'?';
    t[91] = b'2';
    t[94] = b'd';
    t[102] = b'4';
    t[109] = b'5';
    t[110] = b'y';
    t[111] = b'9';
    t[113] = b'F';
    t[115] = b'P';
    t[118] = b'H';
    t[119] = b'A';
    // The S pattern is the 5 pattern plus the top-left segment; both read
    // as 5 so coordinates and knight glyphs decode uniformly.
    t[120] = b'5';
    t[121] = b'E';
    t[122] = b'K';
    t[124] = b'b';
    t[125] = b'6';
    t[127] = b'8';
    t
}

/// Segment pattern (decimal point masked off) to printable glyph.
pub static SEGMENT_TABLE: [u8; 128] = build_segment_table();

/// Decode one raw segment byte. Bit 7 drives the decimal point and is
/// ignored.
pub fn decode_segment(byte: u8) -> char {
    SEGMENT_TABLE[usize::from(byte & 0x7f)] as char
}

/// Inverse of [`decode_segment`]: the first segment pattern showing `glyph`.
pub fn encode_glyph(glyph: char) -> Option<u8> {
    if !glyph.is_ascii() || glyph as u8 == UNKNOWN_GLYPH {
        return None;
    }
    SEGMENT_TABLE
        .iter()
        .position(|&g| g == glyph as u8)
        .and_then(|i| u8::try_from(i).ok())
}

/// Four decoded display characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayText([u8; 4]);

impl DisplayText {
    pub const BLANK: DisplayText = DisplayText(*b"    ");

    /// Build a frame from up to four ASCII characters, padding with blanks.
    pub fn new(text: &str) -> Self {
        let mut bytes = *b"    ";
        for (slot, b) in bytes.iter_mut().zip(text.bytes().filter(u8::is_ascii)) {
            *slot = b;
        }
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn char_at(&self, index: usize) -> char {
        self.0[index] as char
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }

    pub fn has_unknown_glyph(&self) -> bool {
        self.0.contains(&UNKNOWN_GLYPH)
    }

    /// `Err1`..`Err3`.
    pub fn error_code(&self) -> Option<u8> {
        match &self.0 {
            b"Err1" => Some(1),
            b"Err2" => Some(2),
            b"Err3" => Some(3),
            _ => None,
        }
    }

    /// The display shows a coordinate move such as `E2E4`.
    pub fn is_move(&self) -> bool {
        is_coordinate_move(self.as_str())
    }

    /// Lowercase the file letters of a displayed move.
    pub fn to_move(&self) -> String {
        self.as_str()
            .chars()
            .enumerate()
            .map(|(i, c)| if i % 2 == 0 { c.to_ascii_lowercase() } else { c })
            .collect()
    }

    /// Mate or draw announcements shown instead of a move.
    pub fn game_end(&self) -> Option<GameEnd> {
        let text = self.as_str();
        if text.eq_ignore_ascii_case("MAT ") {
            return Some(GameEnd::Mate);
        }
        ["rEuM", "rE 3", "rE50", "PATT"]
            .iter()
            .any(|code| text.eq_ignore_ascii_case(code))
            .then_some(GameEnd::Draw)
    }
}

impl fmt::Display for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayText({:?})", self.as_str())
    }
}

/// `<file><rank><file><rank>` followed by up to three further characters.
pub fn is_coordinate_move(text: &str) -> bool {
    let b = text.as_bytes();
    if !(4..=7).contains(&b.len()) {
        return false;
    }
    let file = |c: u8| (b'a'..=b'h').contains(&c.to_ascii_lowercase());
    let rank = |c: u8| (b'1'..=b'8').contains(&c);
    file(b[0]) && rank(b[1]) && file(b[2]) && rank(b[3])
}

/// Result announcements the device shows in place of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    Mate,
    /// Repetition, fifty moves or stalemate.
    Draw,
}

/// What a completed display sweep means to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySignal {
    /// A new stable frame.
    Frame(DisplayText),
    /// The firmware reported `Err1`..`Err3`.
    Error(u8),
}

/// Assembles digit writes into frames.
#[derive(Debug, Clone)]
pub struct DisplayDecoder {
    raw: [u8; 4],
    pending: [u8; 4],
    stable: DisplayText,
    changed: bool,
}

impl Default for DisplayDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayDecoder {
    pub fn new() -> Self {
        Self {
            raw: [0; 4],
            pending: *b"    ",
            stable: DisplayText::BLANK,
            changed: false,
        }
    }

    /// Feed one digit write. Returns a signal when the write completes a
    /// sweep whose frame is accepted.
    pub fn on_digit_write(&mut self, slot: usize, byte: u8) -> Option<DisplaySignal> {
        let slot = slot & 3;
        self.raw[slot] = byte;
        self.pending[slot] = decode_segment(byte) as u8;
        if slot != 0 {
            return None;
        }

        let text = DisplayText(self.pending);
        if text.has_unknown_glyph()
            || text.as_str().contains("1888")
            || text.is_blank()
            || text == self.stable
        {
            return None;
        }

        log::debug!("display: {text}");
        self.stable = text;
        if let Some(code) = text.error_code() {
            return Some(DisplaySignal::Error(code));
        }
        if text.as_str() != "TIME" {
            self.changed = true;
        }
        Some(DisplaySignal::Frame(text))
    }

    /// Last accepted frame.
    pub fn text(&self) -> DisplayText {
        self.stable
    }

    /// Raw segment bytes of the most recent sweep.
    pub fn raw(&self) -> [u8; 4] {
        self.raw
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(decoder: &mut DisplayDecoder, text: &str) -> Option<DisplaySignal> {
        let glyphs: Vec<char> = text.chars().collect();
        let mut last = None;
        for slot in (0..4).rev() {
            let byte = encode_glyph(glyphs[slot]).expect("representable glyph");
            last = decoder.on_digit_write(slot, byte);
        }
        last
    }

    #[test]
    fn test_decimal_point_is_ignored() {
        assert_eq!(decode_segment(63), '0');
        assert_eq!(decode_segment(63 | 0x80), '0');
        assert_eq!(decode_segment(1), '!');
    }

    #[test]
    fn test_representable_glyphs_round_trip() {
        let glyphs: Vec<char> = SEGMENT_TABLE
            .iter()
            .filter(|&&g| g != UNKNOWN_GLYPH)
            .map(|&g| g as char)
            .collect();
        for window in glyphs.windows(4) {
            let text: String = window.iter().collect();
            let decoded: String = window
                .iter()
                .map(|&c| decode_segment(encode_glyph(c).unwrap()))
                .collect();
            assert_eq!(decoded, text);
        }
        assert_eq!(encode_glyph('!'), None);
        assert_eq!(encode_glyph('Z'), None);
    }

    #[test]
    fn test_frame_commits_after_slot_zero() {
        let mut decoder = DisplayDecoder::new();
        assert_eq!(decoder.on_digit_write(3, encode_glyph('E').unwrap()), None);
        assert_eq!(decoder.text(), DisplayText::BLANK);
        let signal = sweep(&mut decoder, "E2E4");
        assert_eq!(signal, Some(DisplaySignal::Frame(DisplayText::new("E2E4"))));
        assert!(decoder.changed());
        decoder.clear_changed();
        assert_eq!(sweep(&mut decoder, "E2E4"), None);
        assert!(!decoder.changed());
    }

    #[test]
    fn test_rejects_self_test_blank_and_unknown() {
        let mut decoder = DisplayDecoder::new();
        assert_eq!(sweep(&mut decoder, "1888"), None);
        assert_eq!(sweep(&mut decoder, "    "), None);
        decoder.on_digit_write(3, 1);
        decoder.on_digit_write(2, 63);
        decoder.on_digit_write(1, 63);
        assert_eq!(decoder.on_digit_write(0, 63), None);
        assert_eq!(decoder.text(), DisplayText::BLANK);
    }

    #[test]
    fn test_time_frame_does_not_mark_change() {
        let mut decoder = DisplayDecoder::new();
        assert!(sweep(&mut decoder, "TIME").is_some());
        assert!(!decoder.changed());
        assert_eq!(decoder.text().as_str(), "TIME");
    }

    #[test]
    fn test_error_codes_are_signalled() {
        let mut decoder = DisplayDecoder::new();
        assert_eq!(sweep(&mut decoder, "Err2"), Some(DisplaySignal::Error(2)));
    }

    #[test]
    fn test_move_detection_and_lowercasing() {
        let text = DisplayText::new("E7E8");
        assert!(text.is_move());
        assert_eq!(text.to_move(), "e7e8");
        assert!(!DisplayText::new("0000").is_move());
        assert!(!DisplayText::new("E9E8").is_move());
        assert!(is_coordinate_move("e7e8q"));
        assert!(!is_coordinate_move("e7e8queen"));
    }

    #[test]
    fn test_game_end_codes() {
        assert_eq!(DisplayText::new("MAT ").game_end(), Some(GameEnd::Mate));
        assert_eq!(DisplayText::new("PATT").game_end(), Some(GameEnd::Draw));
        assert_eq!(DisplayText::new("rE50").game_end(), Some(GameEnd::Draw));
        assert_eq!(DisplayText::new("rEUM").game_end(), Some(GameEnd::Draw));
        assert_eq!(DisplayText::new("E2E4").game_end(), None);
    }
}
