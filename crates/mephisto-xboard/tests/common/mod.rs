//! Common test utilities for the bridge scenario tests

#![allow(dead_code)] // Not every test file uses every helper

use mephisto_xboard::config::BridgeConfig;
use mephisto_xboard::input::{channel, InputFeeder};
use mephisto_xboard::keymap::KeyCode;
use mephisto_xboard::profile::{DeviceProfile, ProfileOverrides};
use mephisto_xboard::runner::Runner;
use mephisto_xboard::xboard::{GuiWriter, SharedBuffer};
use mephisto_xboard::{Bridge, BridgeState, LoopbackDevice};
use std::time::Duration;

/// Frames allowed for one command to settle
pub const MAX_FRAMES: u64 = 2_000;

/// A bridge wired to a loopback device with captured output.
pub struct Harness {
    pub bridge: Bridge<LoopbackDevice>,
    pub feeder: InputFeeder,
    pub out: SharedBuffer,
    pub runner: Runner,
}

pub fn fast_overrides() -> ProfileOverrides {
    ProfileOverrides {
        bestmove_wait: Some(3),
        special_wait: Some(4),
        input_wait: Some(1),
        promo_wait: Some(1),
        input_timeout: Some(2),
        input_check_period: Some(1),
        ..ProfileOverrides::default()
    }
}

/// Config with short settle windows, no calibration and non-blocking input.
pub fn fast_config(driver: &str, unlimited: bool) -> BridgeConfig {
    let mut profile = DeviceProfile::lookup(driver, unlimited).expect("known driver");
    profile.apply_overrides(&fast_overrides());
    let mut config = BridgeConfig::new(profile)
        .with_tc_delay(100)
        .with_blocking_input(false);
    config.input_poll_timeout = Duration::ZERO;
    config
}

impl Harness {
    pub fn new(driver: &str, unlimited: bool) -> Self {
        Self::with_device(fast_config(driver, unlimited), |device| device)
    }

    /// Build with a customised loopback device.
    pub fn with_device(
        config: BridgeConfig,
        setup: impl FnOnce(LoopbackDevice) -> LoopbackDevice,
    ) -> Self {
        let device = setup(LoopbackDevice::for_profile(&config.profile).with_think_frames(20));
        let (feeder, input) = channel();
        let out = SharedBuffer::new();
        let bridge = Bridge::new(config, device, input, GuiWriter::new(Box::new(out.clone())));
        let mut harness = Self {
            bridge,
            feeder,
            out,
            runner: Runner::unthrottled(),
        };
        harness.settle();
        harness
    }

    /// Run until the bridge is idle and the device is not thinking.
    pub fn settle(&mut self) {
        let idle = self
            .runner
            .run_until(&mut self.bridge, MAX_FRAMES, |b| {
                b.state().accepts_input() && !b.device().is_searching()
            })
            .expect("bridge loop failed");
        assert!(idle, "bridge stuck in {}", self.bridge.state());
    }

    /// Hand a line to the bridge and wait until it has been picked up.
    pub fn submit(&mut self, line: &str) {
        self.feeder.submit(line).expect("input slot busy");
        self.run_until(|b| b.state() != BridgeState::DriverReady);
    }

    /// Submit a line and run until idle.
    pub fn send(&mut self, line: &str) {
        self.submit(line);
        self.settle();
    }

    pub fn run_until(&mut self, done: impl FnMut(&Bridge<LoopbackDevice>) -> bool) -> bool {
        self.runner
            .run_until(&mut self.bridge, MAX_FRAMES, done)
            .expect("bridge loop failed")
    }

    /// Protocol replies since the last call, without `#` comment lines.
    pub fn replies(&self) -> Vec<String> {
        self.out
            .take_lines()
            .into_iter()
            .filter(|line| !line.starts_with('#'))
            .collect()
    }

    /// Comment lines since the last call.
    pub fn comments(&self) -> Vec<String> {
        self.out
            .take_lines()
            .into_iter()
            .filter(|line| line.starts_with('#'))
            .collect()
    }

    pub fn pressed(&self) -> Vec<KeyCode> {
        self.bridge.device().pressed_keys().to_vec()
    }

    /// Key codes the profile's layout produces for `symbols`.
    pub fn expected_keys(&self, symbols: &str) -> Vec<KeyCode> {
        let layout = self.bridge.config().profile.layout;
        symbols
            .chars()
            .map(|s| layout.key_code(s).expect("mapped symbol"))
            .collect()
    }
}
