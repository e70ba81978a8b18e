//! The protocol bridge.
//!
//! [`Bridge`] is a cooperative state machine ticked by its host once per
//! emulated frame. It never blocks except while waiting for GUI input in
//! unlimited mode. Device output reaches it through
//! [`Bridge::on_device_event`] and the 60 Hz timer through
//! [`Bridge::on_timer_tick`].

mod context;
mod handlers;
mod state;

pub use context::{BestMoveRecord, KeyCommand, PortState, Session, SpecialKey, BESTMOVE_RETRIES};
pub use state::BridgeState;

use crate::config::BridgeConfig;
use crate::device::{Device, DeviceEvent};
use crate::display::DisplaySignal;
use crate::error::BridgeError;
use crate::fen::load_fen_file;
use crate::input::InputChannel;
use crate::time_control::TimeControl;
use crate::xboard::{GuiWriter, OutputError, XboardResponse};
use context::BridgeContext;

pub struct Bridge<D: Device> {
    ctx: BridgeContext<D>,
}

impl<D: Device> Bridge<D> {
    pub fn new(config: BridgeConfig, device: D, input: InputChannel, out: GuiWriter) -> Self {
        log::debug!(
            "bridge for {} ({}), unlimited={}",
            config.profile.name,
            config.profile.driver,
            config.profile.unlimited
        );
        Self {
            ctx: BridgeContext::new(config, device, input, out),
        }
    }

    /// Run one frame of the state machine.
    pub fn step(&mut self) -> Result<(), BridgeError> {
        self.ctx.update_port();
        let result = handlers::dispatch(&mut self.ctx);
        self.absorb(result)
    }

    pub fn on_device_event(&mut self, event: DeviceEvent) -> Result<(), BridgeError> {
        let result = match event {
            DeviceEvent::DigitWrite { slot, segments } => self.on_digit_write(slot, segments),
            DeviceEvent::SearchDone => {
                if self.ctx.state == BridgeState::Searching {
                    log::debug!("device search ended");
                    self.ctx.best.search_done = true;
                }
                Ok(())
            }
        };
        self.absorb(result)
    }

    /// Advance the 60 Hz timer.
    pub fn on_timer_tick(&mut self) -> Result<(), BridgeError> {
        self.ctx.port.wait_ticks = self.ctx.port.wait_ticks.saturating_add(1);
        if self.ctx.state == BridgeState::DriverStart {
            self.ctx.calibration.on_timer_tick();
        }
        let result = handlers::check_best_move(&mut self.ctx);
        self.absorb(result)
    }

    /// Position-file trigger. A rising edge loads the file onto the board.
    pub fn on_load_trigger(&mut self, pressed: bool) {
        let rising = pressed && !self.ctx.load_trigger;
        self.ctx.load_trigger = pressed;
        if !rising {
            return;
        }
        if self.ctx.state.is_keying() {
            log::warn!("position file ignored while keys are entered ({})", self.ctx.state);
            return;
        }
        let path = self.ctx.config.fen_file.clone();
        match load_fen_file(&path) {
            Ok(position) => {
                log::info!("loaded {} from {}", position.board.placement(), path.display());
                self.ctx.device.load_board(&position);
                self.ctx.session.side_to_move = position.side_to_move;
                self.ctx.session.position = position;
            }
            Err(e) => log::warn!("cannot load {}: {e}", path.display()),
        }
    }

    fn on_digit_write(&mut self, slot: usize, segments: u8) -> Result<(), OutputError> {
        let ctx = &mut self.ctx;
        match ctx.display.on_digit_write(slot, segments) {
            Some(DisplaySignal::Frame(text)) => {
                if ctx.state == BridgeState::Searching {
                    let info = ctx.info.observe(text, &ctx.config.profile);
                    if let Some(info) = info.filter(|_| ctx.session.post) {
                        ctx.out.send(XboardResponse::Post(info))?;
                    }
                }
            }
            Some(DisplaySignal::Error(code)) => handlers::handle_device_error(ctx, code),
            None => {}
        }
        Ok(())
    }

    /// A vanished GUI ends the session like `quit`.
    fn absorb(&mut self, result: Result<(), OutputError>) -> Result<(), BridgeError> {
        match result {
            Ok(()) => Ok(()),
            Err(OutputError::BrokenPipe) => {
                log::info!("GUI disconnected, shutting down");
                self.ctx.session.exit_requested = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.ctx.state
    }

    pub fn device(&self) -> &D {
        &self.ctx.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.ctx.device
    }

    pub fn session(&self) -> &Session {
        &self.ctx.session
    }

    pub fn time_control(&self) -> &TimeControl {
        &self.ctx.tc
    }

    pub fn command(&self) -> &KeyCommand {
        &self.ctx.command
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.ctx.config
    }

    /// Device delay in effect after calibration.
    pub fn tc_delay_ms(&self) -> u32 {
        self.ctx.tc_delay_ms
    }

    /// `quit` was received or the GUI went away.
    pub fn is_finished(&self) -> bool {
        self.ctx.session.exit_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LoopbackDevice;
    use crate::fen::Board;
    use crate::input::{channel, InputFeeder};
    use crate::runner::Runner;
    use crate::test_helpers::{loopback_bridge, quick_config};
    use std::io::{self, Write};

    fn settle(runner: &mut Runner, bridge: &mut Bridge<LoopbackDevice>) {
        let idle = runner
            .run_until(bridge, 500, |b| {
                b.state() == BridgeState::DriverReady && !b.device().is_searching()
            })
            .unwrap();
        assert!(idle, "bridge stuck in {}", bridge.state());
    }

    /// Submit a line and run until the bridge is idle again.
    fn send_line(
        runner: &mut Runner,
        bridge: &mut Bridge<LoopbackDevice>,
        feeder: &InputFeeder,
        line: &str,
    ) {
        feeder.submit(line).unwrap();
        runner
            .run_until(bridge, 10, |b| b.state() != BridgeState::DriverReady)
            .unwrap();
        settle(runner, bridge);
    }

    fn replies(lines: Vec<String>) -> Vec<String> {
        lines.into_iter().filter(|l| !l.starts_with('#')).collect()
    }

    #[test]
    fn test_ping_answers_and_rolls_display_once_after_new() {
        let (mut bridge, feeder, out) = loopback_bridge(quick_config("mm50"));
        let mut runner = Runner::unthrottled();
        settle(&mut runner, &mut bridge);

        send_line(&mut runner, &mut bridge, &feeder, "ping 7");
        assert_eq!(replies(out.take_lines()), vec!["pong 7"]);
        assert!(bridge.device().pressed_keys().is_empty());

        send_line(&mut runner, &mut bridge, &feeder, "new");
        assert!(!bridge.session().rolling_active);
        send_line(&mut runner, &mut bridge, &feeder, "ping 8");
        assert_eq!(replies(out.take_lines()), vec!["pong 8"]);
        assert_eq!(bridge.device().pressed_keys().len(), "lllsr".len());
        assert!(bridge.session().rolling_active);

        send_line(&mut runner, &mut bridge, &feeder, "post");
        assert_eq!(bridge.device().pressed_keys().len(), "lllsr".len());
    }

    #[test]
    fn test_protover_sends_features() {
        let (mut bridge, feeder, out) = loopback_bridge(quick_config("dallas"));
        let mut runner = Runner::unthrottled();
        settle(&mut runner, &mut bridge);
        send_line(&mut runner, &mut bridge, &feeder, "xboard");
        send_line(&mut runner, &mut bridge, &feeder, "protover 2");
        assert!(bridge.session().xboard);
        assert_eq!(
            replies(out.take_lines()),
            vec!["feature sigint=0 ping=1 setboard=1 color=0 myname=\"Mephisto Dallas\" done=1"]
        );
    }

    #[test]
    fn test_unknown_lines_are_ignored() {
        let (mut bridge, feeder, out) = loopback_bridge(quick_config("mm50"));
        let mut runner = Runner::unthrottled();
        settle(&mut runner, &mut bridge);
        out.take_lines();
        send_line(&mut runner, &mut bridge, &feeder, "accepted setboard");
        send_line(&mut runner, &mut bridge, &feeder, "st x");
        assert!(out.take_lines().is_empty());
        assert!(bridge.device().pressed_keys().is_empty());
    }

    #[test]
    fn test_device_error_returns_to_ready() {
        let (mut bridge, feeder, out) = loopback_bridge(quick_config("mm50"));
        let mut runner = Runner::unthrottled();
        settle(&mut runner, &mut bridge);
        bridge.device_mut().queue_reply("Err1");

        send_line(&mut runner, &mut bridge, &feeder, "go");
        assert_eq!(bridge.state(), BridgeState::DriverReady);
        send_line(&mut runner, &mut bridge, &feeder, "ping 3");
        assert_eq!(replies(out.take_lines()), vec!["pong 3"]);
    }

    #[test]
    fn test_load_trigger_reads_position_file_on_rising_edge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        let config = quick_config("glasgow").with_fen_file(file.path());
        let (mut bridge, _feeder, _out) = loopback_bridge(config);

        bridge.on_load_trigger(true);
        assert_eq!(bridge.device().board_image().count_ones(), 2);
        assert_eq!(bridge.session().side_to_move, crate::fen::Color::Black);

        // Held trigger does not reload.
        bridge.device_mut().soft_reset();
        bridge.on_load_trigger(true);
        assert_eq!(bridge.device().position().board, Board::starting());

        bridge.on_load_trigger(false);
        bridge.on_load_trigger(true);
        assert_eq!(bridge.device().board_image().count_ones(), 2);
    }

    #[test]
    fn test_missing_position_file_is_ignored() {
        let config = quick_config("mm50").with_fen_file("/nonexistent/fen.txt");
        let (mut bridge, _feeder, _out) = loopback_bridge(config);
        bridge.on_load_trigger(true);
        assert_eq!(bridge.device().position().board, Board::starting());
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_pipe_ends_the_session() {
        let config = quick_config("mm50");
        let device = LoopbackDevice::for_profile(&config.profile);
        let (_feeder, input) = channel();
        let mut bridge = Bridge::new(config, device, input, GuiWriter::new(Box::new(ClosedPipe)));
        bridge.step().unwrap();
        assert!(bridge.is_finished());
    }
}
