//! State shared by the bridge handlers.

use super::state::BridgeState;
use crate::config::BridgeConfig;
use crate::device::Device;
use crate::display::DisplayDecoder;
use crate::fen::{Color, Position};
use crate::input::InputChannel;
use crate::profile::DeviceProfile;
use crate::telemetry::InfoAccumulator;
use crate::time_control::{SpeedCalibration, TimeControl, TIME_CHECK_PERIOD};
use crate::xboard::{GuiWriter, OutputError};

/// Extra settle windows granted when the display shows neither a move nor
/// a result after the search ended.
pub const BESTMOVE_RETRIES: u32 = 2;

/// Game and mode flags driven by the GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub side_to_move: Color,
    /// The device only records moves and does not answer them.
    pub force: bool,
    /// The device sits on its infinite level.
    pub analysis: bool,
    pub xboard: bool,
    /// The rolling search display has been switched on.
    pub rolling_active: bool,
    /// Thinking output is forwarded.
    pub post: bool,
    /// Last position set up through `setboard` or the position file.
    pub position: Position,
    /// ENT was pressed to stop the running search.
    pub break_search: bool,
    pub exit_requested: bool,
}

impl Session {
    pub fn new(profile: &DeviceProfile) -> Self {
        Self {
            side_to_move: Color::White,
            force: false,
            analysis: false,
            xboard: false,
            rolling_active: profile.rolling_on,
            post: true,
            position: Position::default(),
            break_search: false,
            exit_requested: false,
        }
    }

    pub fn flip_side(&mut self) {
        self.side_to_move = self.side_to_move.opposite();
    }
}

/// Key symbols for one GUI command plus the cursor of the next key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCommand {
    keys: Vec<char>,
    index: usize,
    repeats: u32,
    /// The last key starts a search.
    pub starts_search: bool,
    /// A move with a promotion piece; piece keys need confirmation.
    pub promotion_move: bool,
}

impl KeyCommand {
    pub fn new(keys: &str) -> Self {
        Self {
            keys: keys.chars().collect(),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> String {
        self.keys.iter().collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current(&self) -> Option<char> {
        self.keys.get(self.index).copied()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.keys.len()
    }

    pub fn exhausted(&self) -> bool {
        self.index >= self.keys.len()
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Step back to the key just sent. Refused once `max` repeats of that
    /// key have been made.
    pub fn repeat(&mut self, max: u32) -> bool {
        if self.index == 0 || self.repeats >= max {
            return false;
        }
        self.index -= 1;
        self.repeats += 1;
        true
    }

    /// The key just sent was confirmed; a later key gets a fresh budget.
    pub fn settle(&mut self) {
        self.repeats = 0;
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    pub fn jump_to_last(&mut self) {
        self.index = self.keys.len().saturating_sub(1);
    }

    pub fn restart(&mut self) {
        self.index = 0;
    }
}

/// Why SendCommand handed over to SpecialCommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    /// MEM, confirmed by `MEM0`
    Memo,
    /// `9`, only needs its settle window
    Nine,
    /// Promotion piece, confirmed once the display leaves `Pr _`
    PromoPiece,
}

/// Progress of reading one search result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestMoveRecord {
    /// The device signalled the end of its search.
    pub search_done: bool,
    /// Ticks left before the display is read.
    pub delay: u32,
    pub retries: u32,
    /// Device move, four characters.
    pub mv: String,
    pub promotion: Option<char>,
    /// The info display reported no promotion.
    pub no_promotion: bool,
    /// Promotion query restarts.
    pub queries: u32,
}

impl BestMoveRecord {
    pub fn arm(&mut self, delay: u32) {
        *self = Self {
            delay,
            ..Self::default()
        };
    }
}

/// Keypad handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortState {
    /// Line of the key currently held down.
    pub key_down: Option<&'static str>,
    /// The last key was acknowledged and released.
    pub ready: bool,
    /// Timer ticks since the last key was pressed.
    pub wait_ticks: u32,
}

impl Default for PortState {
    fn default() -> Self {
        Self {
            key_down: None,
            ready: true,
            wait_ticks: 0,
        }
    }
}

pub struct BridgeContext<D: Device> {
    pub config: BridgeConfig,
    pub device: D,
    pub input: InputChannel,
    pub out: GuiWriter,
    pub state: BridgeState,
    pub session: Session,
    pub tc: TimeControl,
    pub calibration: SpeedCalibration,
    /// Device delay in effect, in milliseconds.
    pub tc_delay_ms: u32,
    pub display: DisplayDecoder,
    pub info: InfoAccumulator,
    pub command: KeyCommand,
    pub special: Option<SpecialKey>,
    pub best: BestMoveRecord,
    pub port: PortState,
    /// A device error code was shown.
    pub error: bool,
    /// Frames until the next input poll.
    pub input_check: u32,
    /// Frames until the next budget check.
    pub time_check: u32,
    pub load_trigger: bool,
}

impl<D: Device> BridgeContext<D> {
    pub fn new(config: BridgeConfig, device: D, input: InputChannel, out: GuiWriter) -> Self {
        let session = Session::new(&config.profile);
        let calibration = SpeedCalibration::new(config.effective_calibration_ticks());
        let tc_delay_ms = config.tc_delay_override.unwrap_or(config.profile.tc_delay_ms);
        Self {
            device,
            input,
            out,
            state: BridgeState::DriverStart,
            session,
            tc: TimeControl::new(),
            calibration,
            tc_delay_ms,
            display: DisplayDecoder::new(),
            info: InfoAccumulator::new(),
            command: KeyCommand::default(),
            special: None,
            best: BestMoveRecord::default(),
            port: PortState::default(),
            error: false,
            input_check: 0,
            time_check: TIME_CHECK_PERIOD,
            load_trigger: false,
            config,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.config.profile
    }

    pub fn set_state(&mut self, next: BridgeState) {
        if self.state != next {
            log::trace!("state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Release the held GUI line and go idle.
    pub fn finish_input(&mut self) {
        self.input.processed();
        self.set_state(BridgeState::DriverReady);
    }

    /// Latch the key for `symbol`. Symbols the layout has no key for are
    /// skipped.
    pub fn press(&mut self, symbol: char) {
        let Some(key) = self.config.profile.layout.key_code(symbol) else {
            log::warn!("No key for symbol '{symbol}' on {}", self.config.profile.driver);
            return;
        };
        if let Some(line) = self.port.key_down.take() {
            self.device.clear_key(line);
        }
        log::trace!("key '{symbol}' -> {key}");
        self.device.inject_key(key);
        self.port = PortState {
            key_down: Some(key.line),
            ready: false,
            wait_ticks: 0,
        };
        self.display.clear_changed();
    }

    /// Release the held key once the firmware has seen it and either the
    /// display reacted or the input timeout passed.
    pub fn update_port(&mut self) {
        let Some(line) = self.port.key_down else {
            return;
        };
        let timed_out = self.port.wait_ticks > self.config.profile.timings.input_timeout;
        if self.device.is_ready() && (self.display.changed() || timed_out) {
            self.device.clear_key(line);
            self.port.key_down = None;
            self.port.ready = true;
        }
    }

    /// Send an operator message to the GUI and the transcript.
    pub fn operator(&mut self, message: impl Into<String>) -> Result<(), OutputError> {
        self.out.operator(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_command_cursor() {
        let mut cmd = KeyCommand::new("l1s");
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd.current(), Some('l'));
        assert!(!cmd.is_last());
        cmd.advance();
        cmd.advance();
        assert!(cmd.is_last());
        assert_eq!(cmd.current(), Some('s'));
        cmd.advance();
        assert!(cmd.exhausted());
        assert_eq!(cmd.current(), None);
        cmd.restart();
        assert_eq!(cmd.current(), Some('l'));
        cmd.jump_to_last();
        assert_eq!(cmd.current(), Some('s'));
    }

    #[test]
    fn test_repeat_is_bounded() {
        let mut cmd = KeyCommand::new("m9r");
        assert!(!cmd.repeat(3));
        cmd.advance();
        for _ in 0..3 {
            assert!(cmd.repeat(3));
            assert_eq!(cmd.current(), Some('m'));
            cmd.advance();
        }
        assert!(!cmd.repeat(3));
        assert_eq!(cmd.repeats(), 3);
        cmd.settle();
        assert!(cmd.repeat(3));
    }

    #[test]
    fn test_best_move_record_rearms() {
        let mut best = BestMoveRecord {
            search_done: true,
            retries: 2,
            mv: "e2e4".into(),
            ..BestMoveRecord::default()
        };
        best.arm(300);
        assert_eq!(best.delay, 300);
        assert!(!best.search_done);
        assert_eq!(best.retries, 0);
        assert!(best.mv.is_empty());
    }
}
