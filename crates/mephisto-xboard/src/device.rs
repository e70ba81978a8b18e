//! The hardware boundary.
//!
//! A [`Device`] is the emulated chess computer: CPU, keypad matrix, LCD and
//! reed-switch board. The bridge only ever latches keys, asks whether the
//! firmware has scanned them and reads the board image. Everything the
//! device says comes back as [`DeviceEvent`]s from [`Device::run_frame`].

use crate::display::{encode_glyph, is_coordinate_move, DisplayText};
use crate::fen::Position;
use crate::keymap::{KeyCode, KeyLayout};
use crate::profile::DeviceProfile;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Events raised by the device while it runs one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The firmware wrote one LCD digit.
    DigitWrite { slot: usize, segments: u8 },
    /// The firmware signalled the end of a search (beeper on most models).
    SearchDone,
}

pub type DeviceEvents = SmallVec<[DeviceEvent; 8]>;

pub trait Device {
    /// Hold a key down until [`Device::clear_key`] releases its line.
    fn inject_key(&mut self, key: KeyCode);

    fn clear_key(&mut self, line: &'static str);

    /// The firmware has scanned the held key at least once.
    fn is_ready(&self) -> bool;

    /// Reed-switch image, bit `i` set when scan square `i` (a8 = 0) is
    /// occupied.
    fn board_image(&self) -> u64;

    /// Place pieces on the sensory board.
    fn load_board(&mut self, position: &Position);

    fn soft_reset(&mut self);

    fn clock_hz(&self) -> u32;

    fn set_clock_hz(&mut self, hz: u32);

    /// Run the emulation for one video frame.
    fn run_frame(&mut self) -> DeviceEvents;
}

/// Symbols a layout can resolve, in reverse-lookup priority.
const SYMBOLS: &str = "abcdefghrpmils09";

/// Frames a loopback search lasts unless configured otherwise.
const DEFAULT_THINK_FRAMES: u32 = 30;

/// Promotion query glyphs and CECP letters for queen, rook, bishop, knight.
const PIECE_GLYPHS: [char; 4] = ['d', 'T', 'L', '5'];
const PIECE_LETTERS: [char; 4] = ['q', 'r', 'b', 'n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Menu {
    None,
    Level,
    Setup,
    Info,
    /// A promotion move was entered; the next coordinate key picks the piece.
    Promotion,
}

#[derive(Debug, Clone)]
struct Search {
    frame: u32,
}

/// A scripted stand-in for the ROM emulator.
///
/// It latches keys, echoes entered coordinates on the display, plays a
/// telemetry script while "searching" and then shows a reply move and
/// raises [`DeviceEvent::SearchDone`]. Without a queued reply it answers
/// with the last move it was given.
#[derive(Debug, Clone)]
pub struct LoopbackDevice {
    layout: KeyLayout,
    clock_hz: u32,
    latched: Option<KeyCode>,
    scanned: bool,
    display: DisplayText,
    entry: String,
    menu: Menu,
    memo: bool,
    memo_lag: u32,
    search: Option<Search>,
    /// ENT ended the search; the end signal goes out with the next frame.
    stopped: bool,
    think_frames: u32,
    telemetry: Vec<DisplayText>,
    replies: VecDeque<DisplayText>,
    promotion_keys: [char; 4],
    promotion_answer: Option<char>,
    last_move: Option<String>,
    last_promotion: Option<char>,
    position: Position,
    pressed: Vec<KeyCode>,
    moves: Vec<String>,
    searches: u32,
}

impl LoopbackDevice {
    pub fn new(layout: KeyLayout, clock_hz: u32) -> Self {
        Self {
            layout,
            clock_hz,
            latched: None,
            scanned: false,
            display: DisplayText::BLANK,
            entry: String::new(),
            menu: Menu::None,
            memo: false,
            memo_lag: 0,
            search: None,
            stopped: false,
            think_frames: DEFAULT_THINK_FRAMES,
            telemetry: vec![DisplayText::new("0000")],
            replies: VecDeque::new(),
            promotion_keys: ['e', 'd', 'c', 'b'],
            promotion_answer: None,
            last_move: None,
            last_promotion: None,
            position: Position::default(),
            pressed: Vec::new(),
            moves: Vec::new(),
            searches: 0,
        }
    }

    /// Loopback wired like the given model.
    pub fn for_profile(profile: &DeviceProfile) -> Self {
        let mut device = Self::new(profile.layout, profile.clock_hz);
        device.promotion_keys = profile.templates.promotion;
        device
    }

    pub fn with_think_frames(mut self, frames: u32) -> Self {
        self.think_frames = frames.max(1);
        self
    }

    /// Frames shown while searching, spread evenly over the search.
    pub fn with_telemetry(mut self, frames: &[&str]) -> Self {
        self.telemetry = frames.iter().map(|f| DisplayText::new(f)).collect();
        self
    }

    /// Ignore the first `presses` MEM keys, as a slow keypad scan would.
    pub fn with_memo_lag(mut self, presses: u32) -> Self {
        self.memo_lag = presses;
        self
    }

    /// Queue the display shown at the end of the next search: a move such
    /// as `e7e5` or a status text such as `MAT `.
    pub fn queue_reply(&mut self, reply: &str) {
        self.replies.push_back(render(reply));
    }

    /// Glyph shown by the promotion query (`d`, `T`, `L`, `5`). `None`
    /// shows the empty-info marker `____`.
    pub fn set_promotion_answer(&mut self, glyph: Option<char>) {
        self.promotion_answer = glyph;
    }

    pub fn display(&self) -> DisplayText {
        self.display
    }

    /// Every key latched so far.
    pub fn pressed_keys(&self) -> &[KeyCode] {
        &self.pressed
    }

    /// Moves entered on the keypad, with promotion suffix where given.
    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn searches_started(&self) -> u32 {
        self.searches
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    fn symbol_of(&self, key: KeyCode) -> Option<char> {
        SYMBOLS
            .chars()
            .find(|&s| self.layout.key_code(s) == Some(key))
    }

    fn press(&mut self, symbol: char) {
        log::trace!("loopback key '{symbol}'");
        match (self.menu, symbol) {
            (_, 'r') => {
                self.entry.clear();
                self.menu = Menu::None;
                self.memo = false;
            }
            (Menu::Info, _) => {}
            (_, 'i') => {
                self.menu = Menu::Info;
                let answer = self
                    .promotion_answer
                    .or_else(|| self.last_promotion.and_then(|k| self.piece_glyph(k)));
                self.display = match answer {
                    Some(glyph) => DisplayText::new(&format!("Pr {glyph}")),
                    None => DisplayText::new("____"),
                };
            }
            (_, 'm') => {
                if self.memo_lag > 0 {
                    self.memo_lag -= 1;
                } else {
                    self.memo = true;
                    self.display = DisplayText::new("MEM0");
                }
            }
            (_, 'l') => {
                self.menu = Menu::Level;
                self.display = DisplayText::new("L  -");
            }
            (_, 'p') => {
                self.menu = Menu::Setup;
                self.entry.clear();
            }
            (Menu::Level, 'a'..='h' | '0' | '9') => {
                self.display = DisplayText::new(&format!("L  {}", level_digit(symbol)));
            }
            (Menu::Promotion, 'a'..='h') => {
                if let Some(glyph) = self.piece_glyph(symbol) {
                    self.last_promotion = Some(symbol);
                    self.display = DisplayText::new(&format!("Pr {glyph}"));
                }
            }
            (_, 'a'..='h') => {
                if self.entry.len() >= 4 {
                    self.entry.clear();
                }
                self.entry.push(symbol);
                self.display = render_entry(&self.entry);
            }
            (_, 's') => self.enter(),
            _ => {}
        }
    }

    fn enter(&mut self) {
        if self.search.is_some() {
            self.finish_search();
            self.stopped = true;
            return;
        }
        match self.menu {
            Menu::Level | Menu::Info => {
                self.menu = Menu::None;
                return;
            }
            Menu::Setup => {
                self.entry.clear();
                return;
            }
            Menu::Promotion => {
                self.menu = Menu::None;
                let letter = self.last_promotion.and_then(|k| self.piece_index(k));
                if let (Some(mv), Some(index)) = (self.moves.last_mut(), letter) {
                    mv.push(PIECE_LETTERS[index]);
                }
            }
            Menu::None => {
                if self.entry.len() == 4 {
                    let mv = entry_move(&self.entry);
                    self.entry.clear();
                    self.last_promotion = None;
                    let promotes = is_promotion_move(&mv);
                    self.moves.push(mv.clone());
                    self.last_move = Some(mv);
                    if promotes {
                        self.menu = Menu::Promotion;
                        self.display = DisplayText::new("Pr _");
                        return;
                    }
                }
            }
        }
        if !self.memo {
            self.start_search();
        }
    }

    fn start_search(&mut self) {
        self.searches += 1;
        self.search = Some(Search { frame: 0 });
        if let Some(first) = self.telemetry.first() {
            self.display = *first;
        }
    }

    fn finish_search(&mut self) {
        self.search = None;
        self.display = match self.replies.pop_front() {
            Some(reply) => reply,
            None => self
                .last_move
                .as_deref()
                .map(render)
                .unwrap_or_else(|| DisplayText::new("E2E4")),
        };
    }

    fn piece_index(&self, key: char) -> Option<usize> {
        self.promotion_keys.iter().position(|&k| k == key)
    }

    fn piece_glyph(&self, key: char) -> Option<char> {
        self.piece_index(key).map(|i| PIECE_GLYPHS[i])
    }
}

impl Device for LoopbackDevice {
    fn inject_key(&mut self, key: KeyCode) {
        self.pressed.push(key);
        self.latched = Some(key);
        self.scanned = false;
    }

    fn clear_key(&mut self, line: &'static str) {
        if self.latched.is_some_and(|k| k.line == line) {
            self.latched = None;
            self.scanned = false;
        }
    }

    fn is_ready(&self) -> bool {
        self.latched.is_some() && self.scanned
    }

    fn board_image(&self) -> u64 {
        self.position.board.occupancy()
    }

    fn load_board(&mut self, position: &Position) {
        self.position = position.clone();
    }

    fn soft_reset(&mut self) {
        self.latched = None;
        self.scanned = false;
        self.display = DisplayText::BLANK;
        self.entry.clear();
        self.menu = Menu::None;
        self.memo = false;
        self.search = None;
        self.stopped = false;
        self.last_move = None;
        self.last_promotion = None;
        self.position = Position::default();
    }

    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn set_clock_hz(&mut self, hz: u32) {
        self.clock_hz = hz;
    }

    fn run_frame(&mut self) -> DeviceEvents {
        let mut events = DeviceEvents::new();

        if let Some(key) = self.latched {
            if !self.scanned {
                self.scanned = true;
                match self.symbol_of(key) {
                    Some(symbol) => self.press(symbol),
                    None => log::warn!("loopback: unmapped key {key}"),
                }
            }
        }

        let mut done = std::mem::take(&mut self.stopped);
        if let Some(search) = self.search.as_mut() {
            search.frame += 1;
            let frame = search.frame;
            if frame >= self.think_frames {
                self.finish_search();
                done = true;
            } else if !self.telemetry.is_empty() {
                let step = (self.think_frames / self.telemetry.len() as u32).max(1);
                let index = (frame / step) as usize;
                if let Some(text) = self.telemetry.get(index) {
                    self.display = *text;
                }
            }
        }
        // One sweep per frame, highest slot first.
        let bytes = self.display.bytes();
        for slot in (0..4).rev() {
            let segments = encode_glyph(bytes[slot] as char).unwrap_or(0x01);
            events.push(DeviceEvent::DigitWrite { slot, segments });
        }
        if done {
            events.push(DeviceEvent::SearchDone);
        }
        events
    }
}

/// Keypad symbols alternate file and rank; ranks arrive as `a`..`h`.
fn entry_move(entry: &str) -> String {
    entry
        .chars()
        .enumerate()
        .map(|(i, c)| if i % 2 == 1 { rank_digit(c) } else { c })
        .collect()
}

fn rank_digit(symbol: char) -> char {
    (b'1' + (symbol as u8 - b'a')) as char
}

fn level_digit(symbol: char) -> char {
    match symbol {
        'a'..='h' => rank_digit(symbol),
        other => other,
    }
}

fn file_glyph(file: char) -> char {
    match file {
        'b' | 'd' => file,
        other => other.to_ascii_uppercase(),
    }
}

fn render_entry(entry: &str) -> DisplayText {
    let shown: String = entry_move(entry)
        .chars()
        .enumerate()
        .map(|(i, c)| if i % 2 == 0 { file_glyph(c) } else { c })
        .collect();
    DisplayText::new(&shown)
}

/// Show a move with LCD glyphs, or a status text as it is.
fn render(text: &str) -> DisplayText {
    if is_coordinate_move(text) {
        let lower = text.to_ascii_lowercase();
        let shown: String = lower
            .chars()
            .take(4)
            .enumerate()
            .map(|(i, c)| if i % 2 == 0 { file_glyph(c) } else { c })
            .collect();
        DisplayText::new(&shown)
    } else {
        DisplayText::new(text)
    }
}

fn is_promotion_move(mv: &str) -> bool {
    let b = mv.as_bytes();
    (b[1] == b'7' && b[3] == b'8') || (b[1] == b'2' && b[3] == b'1')
}
