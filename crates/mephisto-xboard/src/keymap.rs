//! Keypad layouts.
//!
//! Every device reads its keypad as a set of input lines, each line carrying
//! up to eight keys selected by a bitmask. The bridge speaks in single
//! character key symbols:
//!
//! | symbol | key |
//! |--------|-----|
//! | `a`-`h` | board file A-H (also rank 1-8) |
//! | `1`-`8` | aliases for `a`-`h` |
//! | `r` | CL (clear) |
//! | `p` | POS |
//! | `m` | MEM |
//! | `i` | INFO |
//! | `l` | LEV |
//! | `s` | ENT |
//! | `0` | white / side key |
//! | `9` | black / side key |

use std::fmt;

/// Physical keyboard wiring of a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// MM-series modules (MM IV, MM V, Rebell).
    Mm,
    /// Mephisto III S Glasgow and the first Dallas.
    Glasgow,
    /// Amsterdam, Dallas 16/32 and Roma.
    GlasgowNew,
}

/// An electrical key press: the line the firmware scans and the bit that
/// reads low while the key is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCode {
    pub line: &'static str,
    pub mask: u8,
}

impl KeyCode {
    const fn new(line: &'static str, mask: u8) -> Self {
        Self { line, mask }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:#04x}", self.line, self.mask)
    }
}

/// Board coordinates double as digits on every layout.
fn canonical(symbol: char) -> char {
    match symbol {
        '1'..='8' => (b'a' + (symbol as u8 - b'1')) as char,
        other => other.to_ascii_lowercase(),
    }
}

impl KeyLayout {
    /// Resolve a key symbol. Returns `None` for symbols the layout has no
    /// key for.
    pub fn key_code(self, symbol: char) -> Option<KeyCode> {
        let symbol = canonical(symbol);
        match self {
            KeyLayout::Mm => mm_key(symbol),
            KeyLayout::Glasgow => glasgow_key(symbol),
            KeyLayout::GlasgowNew => glasgow_new_key(symbol),
        }
    }

    /// Input lines the layout scans, used when releasing every key.
    pub fn lines(self) -> &'static [&'static str] {
        match self {
            KeyLayout::Mm => &["KEY1_0", "KEY1_1", "KEY1_2", "KEY1_3", "KEY1_4", "KEY1_5",
                "KEY1_6", "KEY1_7", "KEY2_0", "KEY2_1", "KEY2_2", "KEY2_3", "KEY2_4",
                "KEY2_5", "KEY2_6", "KEY2_7"],
            KeyLayout::Glasgow | KeyLayout::GlasgowNew => &["LINE0", "LINE1"],
        }
    }
}

fn mm_key(symbol: char) -> Option<KeyCode> {
    let line = match symbol {
        'a' => "KEY2_3",
        'b' => "KEY2_5",
        'c' => "KEY2_6",
        'd' => "KEY2_7",
        'e' => "KEY2_0",
        'f' => "KEY2_1",
        'g' => "KEY2_2",
        'h' => "KEY2_4",
        'r' => "KEY1_0",
        'p' => "KEY1_1",
        'm' => "KEY1_2",
        'i' => "KEY1_3",
        'l' => "KEY1_4",
        's' => "KEY1_5",
        '0' => "KEY1_6",
        '9' => "KEY1_7",
        _ => return None,
    };
    Some(KeyCode::new(line, 0x80))
}

fn glasgow_key(symbol: char) -> Option<KeyCode> {
    let code = match symbol {
        'a' => KeyCode::new("LINE0", 0x20),
        'b' => KeyCode::new("LINE0", 0x80),
        'c' => KeyCode::new("LINE0", 0x04),
        'd' => KeyCode::new("LINE0", 0x10),
        'e' => KeyCode::new("LINE1", 0x01),
        'f' => KeyCode::new("LINE0", 0x40),
        'g' => KeyCode::new("LINE1", 0x40),
        'h' => KeyCode::new("LINE1", 0x10),
        'r' => KeyCode::new("LINE0", 0x02),
        'p' => KeyCode::new("LINE1", 0x08),
        'm' => KeyCode::new("LINE1", 0x80),
        'i' => KeyCode::new("LINE1", 0x02),
        'l' => KeyCode::new("LINE1", 0x20),
        's' => KeyCode::new("LINE0", 0x08),
        '0' => KeyCode::new("LINE1", 0x04),
        '9' => KeyCode::new("LINE0", 0x01),
        _ => return None,
    };
    Some(code)
}

fn glasgow_new_key(symbol: char) -> Option<KeyCode> {
    let code = match symbol {
        'a' => KeyCode::new("LINE0", 0x01),
        'b' => KeyCode::new("LINE0", 0x02),
        'c' => KeyCode::new("LINE0", 0x04),
        'd' => KeyCode::new("LINE0", 0x08),
        'e' => KeyCode::new("LINE0", 0x10),
        'f' => KeyCode::new("LINE0", 0x20),
        'g' => KeyCode::new("LINE1", 0x40),
        'h' => KeyCode::new("LINE1", 0x80),
        'r' => KeyCode::new("LINE1", 0x10),
        'p' => KeyCode::new("LINE1", 0x02),
        'm' => KeyCode::new("LINE1", 0x08),
        'i' => KeyCode::new("LINE1", 0x01),
        'l' => KeyCode::new("LINE1", 0x04),
        's' => KeyCode::new("LINE1", 0x20),
        '0' => KeyCode::new("LINE0", 0x80),
        '9' => KeyCode::new("LINE0", 0x40),
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOLS: &str = "abcdefghrpmils09";

    #[test]
    fn test_digits_alias_files() {
        for layout in [KeyLayout::Mm, KeyLayout::Glasgow, KeyLayout::GlasgowNew] {
            for (digit, file) in "12345678".chars().zip("abcdefgh".chars()) {
                assert_eq!(layout.key_code(digit), layout.key_code(file), "{layout:?} {digit}");
            }
        }
    }

    #[test]
    fn test_every_layout_maps_all_symbols_to_distinct_keys() {
        for layout in [KeyLayout::Mm, KeyLayout::Glasgow, KeyLayout::GlasgowNew] {
            let mut seen = Vec::new();
            for symbol in SYMBOLS.chars() {
                let code = layout
                    .key_code(symbol)
                    .unwrap_or_else(|| panic!("{layout:?} missing {symbol}"));
                assert!(!seen.contains(&code), "{layout:?} duplicates {code}");
                assert!(layout.lines().contains(&code.line));
                seen.push(code);
            }
        }
    }

    #[test]
    fn test_uppercase_files_resolve() {
        assert_eq!(KeyLayout::Glasgow.key_code('E'), Some(KeyCode::new("LINE1", 0x01)));
        assert_eq!(KeyLayout::Mm.key_code('x'), None);
    }

    #[test]
    fn test_layouts_differ_in_wiring() {
        assert_eq!(KeyLayout::Mm.key_code('s'), Some(KeyCode::new("KEY1_5", 0x80)));
        assert_eq!(KeyLayout::Glasgow.key_code('s'), Some(KeyCode::new("LINE0", 0x08)));
        assert_eq!(KeyLayout::GlasgowNew.key_code('s'), Some(KeyCode::new("LINE1", 0x20)));
    }
}
