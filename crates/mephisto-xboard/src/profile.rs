//! Device profiles.
//!
//! A [`DeviceProfile`] captures everything that differs between the
//! supported Mephisto models: keypad wiring, display behaviour, settle
//! windows and the key sequences that select levels and modes. It is
//! resolved once at startup and then only read.

use crate::error::ConfigError;
use crate::keymap::KeyLayout;
use serde::Deserialize;

/// Firmware family. Decides how search telemetry frames are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Mm,
    Glasgow,
}

/// Settle windows in 60 Hz timer ticks, plus the input polling period in
/// frames while a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileTimings {
    /// Ticks after the search-end signal before the display is read.
    pub bestmove_wait: u32,
    /// Ticks before a special key's confirmation is checked.
    pub special_wait: u32,
    /// Minimum ticks between two key presses.
    pub input_wait: u32,
    /// Minimum ticks between keys of the promotion query.
    pub promo_wait: u32,
    /// Ticks after which a latched key counts as acknowledged even
    /// without a display change.
    pub input_timeout: u32,
    /// Frames between two input checks while searching.
    pub input_check_period: u32,
}

impl ProfileTimings {
    const fn new(
        bestmove_wait: u32,
        special_wait: u32,
        input_wait: u32,
        promo_wait: u32,
        input_timeout: u32,
        input_check_period: u32,
    ) -> Self {
        Self {
            bestmove_wait,
            special_wait,
            input_wait,
            promo_wait,
            input_timeout,
            input_check_period,
        }
    }
}

/// Operator overrides for a profile, read from the TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverrides {
    pub bestmove_wait: Option<u32>,
    pub special_wait: Option<u32>,
    pub input_wait: Option<u32>,
    pub promo_wait: Option<u32>,
    pub input_timeout: Option<u32>,
    pub input_check_period: Option<u32>,
    pub tc_delay: Option<u32>,
    pub max_key_repeats: Option<u32>,
}

/// Key sequences for the device's menus. An empty string means the model
/// has no equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplates {
    /// `st N` levels keyed by seconds.
    pub fixed_time: &'static [(u32, &'static str)],
    /// `level 40 120`.
    pub tournament: &'static str,
    /// Infinite level.
    pub infinite: &'static str,
    /// `level 0 N` blitz levels keyed by minutes.
    pub blitz: &'static [(u32, &'static str)],
    pub analyze: &'static str,
    pub undo: &'static str,
    pub remove: &'static str,
    pub setboard: &'static str,
    pub force: &'static str,
    pub show_promotion: &'static str,
    /// Keys selecting queen, rook, bishop and knight in that order.
    pub promotion: [char; 4],
    pub roll_display: &'static str,
}

impl CommandTemplates {
    pub fn fixed_time(&self, seconds: u32) -> Option<&'static str> {
        lookup(self.fixed_time, seconds)
    }

    pub fn blitz(&self, minutes: u32) -> Option<&'static str> {
        lookup(self.blitz, minutes)
    }

    /// Device key for a CECP promotion letter.
    pub fn promotion_key(&self, piece: char) -> Option<char> {
        let [queen, rook, bishop, knight] = self.promotion;
        match piece.to_ascii_lowercase() {
            'q' => Some(queen),
            'r' => Some(rook),
            'b' => Some(bishop),
            'n' => Some(knight),
            _ => None,
        }
    }

    pub fn is_promotion_key(&self, key: char) -> bool {
        self.promotion.contains(&key)
    }
}

fn lookup(table: &'static [(u32, &'static str)], key: u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, cmd)| *cmd)
        .filter(|cmd| !cmd.is_empty())
}

const MM_TEMPLATES: CommandTemplates = CommandTemplates {
    fixed_time: &[
        (3, "l0s"),
        (5, "l1s"),
        (10, "l2s"),
        (20, "l3s"),
        (60, "l4s"),
        (120, "l5s"),
        (600, "l7s"),
        (360, "l8s"),
    ],
    tournament: "l6s",
    infinite: "l9s",
    blitz: &[(5, "ll1s"), (10, "ll4s"), (15, "ll6s"), (30, "ll7s"), (60, "ll8s")],
    analyze: "l9ss",
    undo: "m9r",
    remove: "m99r",
    setboard: "pss",
    force: "rm",
    show_promotion: "ia00r",
    promotion: ['e', 'd', 'c', 'b'],
    roll_display: "lllsr",
};

const MM_LATE_FIXED_TIME: &[(u32, &str)] = &[
    (3, "l0s"),
    (5, "l1s"),
    (10, "l2s"),
    (20, "l3s"),
    (60, "l4s"),
    (120, "l5s"),
    (600, "l7s"),
    (720, "l8s"),
];

const GLASGOW_TEMPLATES: CommandTemplates = CommandTemplates {
    fixed_time: &[
        (3, "l0s"),
        (5, "l1s"),
        (10, "l2s"),
        (20, "l3s"),
        (60, "l4s"),
        (120, "l5s"),
        (600, "l8s00s10s00s"),
    ],
    tournament: "l6s",
    infinite: "l9s",
    blitz: &[],
    show_promotion: "ia0r",
    promotion: ['f', 'e', 'd', 'c'],
    roll_display: "",
    ..MM_TEMPLATES
};

const DALLAS_BLITZ: &[(u32, &str)] = &[
    (5, "l7s00s05s00s"),
    (10, "l7s00s10s00s"),
    (15, "l7s00s15s00s"),
    (30, "l7s00s30s00s"),
    (60, "l7s01s00s00s"),
];

const ROMA_TEMPLATES: CommandTemplates = CommandTemplates {
    fixed_time: &[
        (3, "l02s"),
        (5, "l03s"),
        (10, "l04s"),
        (20, "l50s00s00s20s"),
        (60, "l50s00s01s00s"),
        (120, "l50s00s02s00s"),
    ],
    tournament: "l40s",
    infinite: "l99s",
    blitz: &[(5, "l32s"), (10, "l34s"), (15, "l35s"), (30, "l37s"), (60, "l38s01s00s00s")],
    roll_display: "llsr",
    ..GLASGOW_TEMPLATES
};

/// Static description of one model, before the speed mode is chosen.
struct Model {
    driver: &'static str,
    name: &'static str,
    family: Family,
    layout: KeyLayout,
    original_clock: u32,
    unlimited_clock: u32,
    input_clock: u32,
    unlimited: ProfileTimings,
    normal: ProfileTimings,
    tc_delay: u32,
    templates: CommandTemplates,
    rolling_exists: bool,
    rolling_on: bool,
    frame_filter: bool,
    fixed_ply: bool,
}

const MM_UNLIMITED: ProfileTimings = ProfileTimings::new(300, 300, 30, 60, 200, 1000);
const MM_NORMAL: ProfileTimings = ProfileTimings::new(80, 300, 30, 60, 200, 100);
const DALLAS_UNLIMITED: ProfileTimings = ProfileTimings::new(100, 100, 30, 20, 50, 1000);
const DALLAS_NORMAL: ProfileTimings = ProfileTimings::new(50, 100, 30, 20, 50, 100);

const MODELS: &[Model] = &[
    Model {
        driver: "mm50",
        name: "Mephisto MM V (5.0)",
        family: Family::Mm,
        layout: KeyLayout::Mm,
        original_clock: 4_915_200,
        unlimited_clock: 1_250_000,
        input_clock: 1_250_000,
        unlimited: MM_UNLIMITED,
        normal: MM_NORMAL,
        tc_delay: 1000,
        templates: MM_TEMPLATES,
        rolling_exists: true,
        rolling_on: true,
        frame_filter: false,
        fixed_ply: false,
    },
    Model {
        driver: "mm5",
        name: "Mephisto MM V (5.1)",
        family: Family::Mm,
        layout: KeyLayout::Mm,
        original_clock: 4_915_200,
        unlimited_clock: 1_250_000,
        input_clock: 1_250_000,
        unlimited: MM_UNLIMITED,
        normal: MM_NORMAL,
        tc_delay: 800,
        templates: CommandTemplates { blitz: &[], ..MM_TEMPLATES },
        rolling_exists: true,
        rolling_on: true,
        frame_filter: false,
        fixed_ply: false,
    },
    Model {
        driver: "mm4",
        name: "Mephisto MM IV",
        family: Family::Mm,
        layout: KeyLayout::Mm,
        original_clock: 4_915_200,
        unlimited_clock: 1_250_000,
        input_clock: 1_250_000,
        unlimited: ProfileTimings::new(200, 300, 10, 20, 50, 1000),
        normal: ProfileTimings::new(40, 300, 6, 20, 50, 100),
        tc_delay: 600,
        templates: CommandTemplates {
            fixed_time: MM_LATE_FIXED_TIME,
            blitz: &[],
            roll_display: "llsr",
            ..MM_TEMPLATES
        },
        rolling_exists: true,
        rolling_on: true,
        frame_filter: false,
        fixed_ply: false,
    },
    Model {
        driver: "rebel5",
        name: "Mephisto MM Rebell 5.0",
        family: Family::Mm,
        layout: KeyLayout::Mm,
        original_clock: 4_915_200,
        unlimited_clock: 4_915_200,
        input_clock: 4_915_200,
        unlimited: ProfileTimings::new(200, 100, 10, 20, 50, 1000),
        normal: ProfileTimings::new(40, 100, 6, 20, 50, 100),
        tc_delay: 600,
        templates: CommandTemplates {
            fixed_time: MM_LATE_FIXED_TIME,
            roll_display: "",
            ..MM_TEMPLATES
        },
        rolling_exists: false,
        rolling_on: false,
        frame_filter: false,
        fixed_ply: false,
    },
    Model {
        driver: "glasgow",
        name: "Mephisto III S Glasgow",
        family: Family::Glasgow,
        layout: KeyLayout::Glasgow,
        original_clock: 12_000_000,
        unlimited_clock: 3_000_000,
        input_clock: 3_000_000,
        unlimited: ProfileTimings::new(100, 100, 10, 20, 50, 1000),
        normal: ProfileTimings::new(150, 100, 6, 20, 50, 100),
        tc_delay: 2000,
        templates: GLASGOW_TEMPLATES,
        rolling_exists: true,
        rolling_on: true,
        frame_filter: false,
        fixed_ply: false,
    },
    Model {
        driver: "dallas",
        name: "Mephisto Dallas",
        family: Family::Glasgow,
        layout: KeyLayout::Glasgow,
        original_clock: 12_000_000,
        unlimited_clock: 3_000_000,
        input_clock: 5_000_000,
        unlimited: DALLAS_UNLIMITED,
        normal: DALLAS_NORMAL,
        tc_delay: 2000,
        templates: CommandTemplates { blitz: DALLAS_BLITZ, ..GLASGOW_TEMPLATES },
        rolling_exists: true,
        rolling_on: true,
        frame_filter: false,
        fixed_ply: true,
    },
    Model {
        driver: "amsterd",
        name: "Mephisto Amsterdam",
        family: Family::Glasgow,
        layout: KeyLayout::GlasgowNew,
        original_clock: 12_000_000,
        unlimited_clock: 3_000_000,
        input_clock: 5_000_000,
        unlimited: DALLAS_UNLIMITED,
        normal: DALLAS_NORMAL,
        tc_delay: 2000,
        templates: GLASGOW_TEMPLATES,
        rolling_exists: true,
        rolling_on: true,
        frame_filter: true,
        fixed_ply: true,
    },
    Model {
        driver: "dallas16",
        name: "Mephisto Dallas 16 Bit",
        family: Family::Glasgow,
        layout: KeyLayout::GlasgowNew,
        original_clock: 12_000_000,
        unlimited_clock: 3_000_000,
        input_clock: 5_000_000,
        unlimited: DALLAS_UNLIMITED,
        normal: DALLAS_NORMAL,
        tc_delay: 2000,
        templates: CommandTemplates { blitz: DALLAS_BLITZ, ..GLASGOW_TEMPLATES },
        rolling_exists: true,
        rolling_on: true,
        frame_filter: true,
        fixed_ply: true,
    },
    Model {
        driver: "dallas32",
        name: "Mephisto Dallas 32 Bit",
        family: Family::Glasgow,
        layout: KeyLayout::GlasgowNew,
        original_clock: 14_000_000,
        unlimited_clock: 8_000_000,
        input_clock: 5_000_000,
        unlimited: ProfileTimings::new(100, 100, 30, 20, 50, 100),
        normal: DALLAS_NORMAL,
        tc_delay: 1300,
        templates: CommandTemplates { blitz: DALLAS_BLITZ, ..GLASGOW_TEMPLATES },
        rolling_exists: true,
        rolling_on: true,
        frame_filter: false,
        fixed_ply: true,
    },
    Model {
        driver: "roma32",
        name: "Mephisto Roma 32 Bit",
        family: Family::Glasgow,
        layout: KeyLayout::GlasgowNew,
        original_clock: 14_000_000,
        unlimited_clock: 8_000_000,
        input_clock: 5_000_000,
        unlimited: ProfileTimings::new(200, 100, 70, 20, 50, 100),
        normal: ProfileTimings::new(100, 100, 70, 20, 50, 100),
        tc_delay: 2000,
        templates: ROMA_TEMPLATES,
        rolling_exists: true,
        rolling_on: false,
        frame_filter: false,
        fixed_ply: true,
    },
];

/// Default bound on how often a special key or promotion query is repeated.
pub const DEFAULT_MAX_KEY_REPEATS: u32 = 3;

/// A model profile resolved for one speed mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Short driver name, also used for the transcript file name.
    pub driver: &'static str,
    /// Name reported to the GUI.
    pub name: &'static str,
    pub family: Family,
    pub layout: KeyLayout,
    /// Clock the device runs searches at.
    pub clock_hz: u32,
    /// Native clock of the real hardware.
    pub original_clock_hz: u32,
    /// Clock used while keys are entered in normal-speed mode.
    pub input_clock_hz: u32,
    pub unlimited: bool,
    pub timings: ProfileTimings,
    /// Move entry and exit overhead subtracted from every move budget.
    pub tc_delay_ms: u32,
    pub templates: CommandTemplates,
    /// The model has a multi-frame search display.
    pub rolling_exists: bool,
    /// The rolling display is on after power-up.
    pub rolling_on: bool,
    /// Drop malformed telemetry frames (Amsterdam and Dallas 16 glitch).
    pub frame_filter: bool,
    /// The second telemetry frame is elapsed time, not depth.
    pub fixed_ply: bool,
    pub max_key_repeats: u32,
}

impl DeviceProfile {
    /// Resolve the profile for `driver` in the given speed mode.
    pub fn lookup(driver: &str, unlimited: bool) -> Result<Self, ConfigError> {
        let model = MODELS
            .iter()
            .find(|m| m.driver.eq_ignore_ascii_case(driver))
            .ok_or_else(|| ConfigError::UnknownDriver(driver.to_string(), Self::drivers().join(", ")))?;

        Ok(Self {
            driver: model.driver,
            name: model.name,
            family: model.family,
            layout: model.layout,
            clock_hz: if unlimited { model.unlimited_clock } else { model.original_clock },
            original_clock_hz: model.original_clock,
            input_clock_hz: model.input_clock,
            unlimited,
            timings: if unlimited { model.unlimited } else { model.normal },
            tc_delay_ms: model.tc_delay,
            templates: model.templates,
            rolling_exists: model.rolling_exists,
            rolling_on: model.rolling_on,
            frame_filter: model.frame_filter,
            fixed_ply: model.fixed_ply,
            max_key_repeats: DEFAULT_MAX_KEY_REPEATS,
        })
    }

    /// All supported driver names.
    pub fn drivers() -> Vec<&'static str> {
        MODELS.iter().map(|m| m.driver).collect()
    }

    pub fn apply_overrides(&mut self, overrides: &ProfileOverrides) {
        let t = &mut self.timings;
        t.bestmove_wait = overrides.bestmove_wait.unwrap_or(t.bestmove_wait);
        t.special_wait = overrides.special_wait.unwrap_or(t.special_wait);
        t.input_wait = overrides.input_wait.unwrap_or(t.input_wait);
        t.promo_wait = overrides.promo_wait.unwrap_or(t.promo_wait);
        t.input_timeout = overrides.input_timeout.unwrap_or(t.input_timeout);
        t.input_check_period = overrides.input_check_period.unwrap_or(t.input_check_period);
        self.tc_delay_ms = overrides.tc_delay.unwrap_or(self.tc_delay_ms);
        self.max_key_repeats = overrides.max_key_repeats.unwrap_or(self.max_key_repeats);
    }
}
