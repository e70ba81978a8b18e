//! Search status collection.
//!
//! While searching, models with a rolling display cycle through several
//! frames (depth, score, elapsed time, principal variation). The
//! [`InfoAccumulator`] gathers one cycle and assembles a [`PostInfo`] line.
//! Models without a rolling display show a single status frame that is
//! reported as it is.

use crate::display::DisplayText;
use crate::profile::{DeviceProfile, Family};
use smallvec::SmallVec;
use std::fmt;

/// Upper bound on frames kept for one cycle.
pub const MAX_FRAMES: usize = 7;

/// Frames per rolling cycle after which a status line is assembled.
const ROLLING_CYCLE: usize = 5;

/// Distinct frames after a reset marker on non-rolling displays.
const STATIC_CYCLE: u32 = 4;

/// One CECP thinking-output line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostInfo {
    pub ply: u32,
    /// Centipawns from the device's point of view.
    pub score: i32,
    /// Centiseconds.
    pub time: u64,
    pub nodes: u64,
    pub pv: Vec<String>,
}

impl fmt::Display for PostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.ply, self.score, self.time, self.nodes)?;
        for mv in &self.pv {
            write!(f, " {mv}")?;
        }
        Ok(())
    }
}

/// Collects display frames of one search-status cycle.
#[derive(Debug, Clone, Default)]
pub struct InfoAccumulator {
    frames: SmallVec<[DisplayText; MAX_FRAMES]>,
    last: Option<DisplayText>,
    active: bool,
    static_count: u32,
}

impl InfoAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current cycle. Called when a search starts or ends.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.last = None;
        self.active = false;
        self.static_count = 0;
    }

    pub fn frames(&self) -> &[DisplayText] {
        &self.frames
    }

    /// Feed the current display. Returns a status line when a cycle
    /// completes.
    pub fn observe(&mut self, text: DisplayText, profile: &DeviceProfile) -> Option<PostInfo> {
        if profile.frame_filter && !is_plausible_frame(text) {
            return None;
        }
        if text.has_unknown_glyph() || text.is_blank() || self.last == Some(text) {
            return None;
        }
        self.last = Some(text);

        if is_cycle_start(text, profile.family) {
            self.frames.clear();
            self.static_count = 0;
            self.active = true;
        }
        if !self.active {
            return None;
        }

        if !profile.rolling_exists {
            return self.observe_static(text, profile.family);
        }

        if profile.family == Family::Glasgow {
            self.push(text);
        }
        let info = if self.frames.len() >= ROLLING_CYCLE {
            let info = match profile.family {
                Family::Mm => assemble_mm(&self.frames),
                Family::Glasgow => assemble_glasgow(&self.frames, profile.fixed_ply),
            };
            self.frames.clear();
            Some(info)
        } else {
            None
        };
        if profile.family == Family::Mm {
            self.push(text);
        }
        info
    }

    fn observe_static(&mut self, text: DisplayText, family: Family) -> Option<PostInfo> {
        if self.static_count >= STATIC_CYCLE {
            self.static_count = 0;
            return Some(PostInfo {
                ply: 1,
                time: parse_time(text),
                ..PostInfo::default()
            });
        }
        if text.as_str() != "0000" && family == Family::Mm {
            self.static_count += 1;
        }
        None
    }

    fn push(&mut self, text: DisplayText) {
        if self.frames.len() < MAX_FRAMES {
            self.frames.push(text);
        }
    }
}

fn is_cycle_start(text: DisplayText, family: Family) -> bool {
    let s = text.as_str();
    match family {
        Family::Mm => s == "0000" || s == "8888",
        Family::Glasgow => s == "0000" || s.starts_with(' ') || s.starts_with('-'),
    }
}

/// Amsterdam and Dallas 16 briefly show half-refreshed frames while
/// searching. Keep only frames made of status glyphs that are either
/// numeric or a well-formed move.
pub fn is_plausible_frame(text: DisplayText) -> bool {
    const STATUS_GLYPHS: &str = " -0123456789AbCdEFGH";
    const MOVE_GLYPHS: &str = "AbCdEFGH";
    let s = text.as_str();
    if s == "8888" || !s.chars().any(|c| STATUS_GLYPHS.contains(c)) {
        return false;
    }
    !(s.chars().any(|c| MOVE_GLYPHS.contains(c)) && !text.is_move())
}

fn assemble_mm(frames: &[DisplayText]) -> PostInfo {
    PostInfo {
        time: parse_time(frames[0]),
        pv: frames[1..3].iter().filter_map(|f| pv_move(*f)).collect(),
        ply: parse_ply(frames[3]),
        score: parse_score(frames[4]),
        nodes: 0,
    }
}

fn assemble_glasgow(frames: &[DisplayText], fixed_ply: bool) -> PostInfo {
    let (ply, time) = if fixed_ply {
        (1, parse_time(frames[1]))
    } else {
        (parse_ply(frames[1]), 0)
    };
    PostInfo {
        score: parse_score(frames[0]),
        ply,
        time,
        nodes: 0,
        pv: frames[2..5].iter().filter_map(|f| pv_move(*f)).collect(),
    }
}

fn pv_move(frame: DisplayText) -> Option<String> {
    frame.is_move().then(|| frame.to_move())
}

fn digits(s: &str) -> u64 {
    s.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u64, |acc, d| acc.saturating_mul(10).saturating_add(u64::from(d)))
}

/// Depth from the first two glyphs of the depth frame.
fn parse_ply(frame: DisplayText) -> u32 {
    u32::try_from(digits(&frame.as_str()[..2])).unwrap_or(0)
}

/// The score frame shows pawns with two decimals; the decimal point lives
/// in the masked segment bit, so the digits already read as centipawns.
fn parse_score(frame: DisplayText) -> i32 {
    let value = i32::try_from(digits(frame.as_str())).unwrap_or(i32::MAX);
    if frame.as_str().contains('-') {
        -value
    } else {
        value
    }
}

/// `MMSS` elapsed time in centiseconds.
fn parse_time(frame: DisplayText) -> u64 {
    let total = digits(frame.as_str());
    let minutes = total / 100;
    let seconds = total % 100;
    (minutes * 60 + seconds) * 100
}
