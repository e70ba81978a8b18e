//! Test helpers shared by the unit tests

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::device::LoopbackDevice;
use crate::input::{channel, InputFeeder};
use crate::profile::{DeviceProfile, ProfileOverrides};
use crate::xboard::{GuiWriter, SharedBuffer};
use std::time::Duration;

/// Settle windows of a few frames so scenarios finish quickly.
pub(crate) fn quick_overrides() -> ProfileOverrides {
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

/// Unlimited-mode config that skips calibration and never blocks on input.
pub(crate) fn quick_config(driver: &str) -> BridgeConfig {
    let mut profile = DeviceProfile::lookup(driver, true).expect("known driver");
    profile.apply_overrides(&quick_overrides());
    let mut config = BridgeConfig::new(profile)
        .with_tc_delay(100)
        .with_blocking_input(false);
    config.input_poll_timeout = Duration::ZERO;
    config
}

/// Bridge over a loopback device with captured output.
pub(crate) fn loopback_bridge(
    config: BridgeConfig,
) -> (Bridge<LoopbackDevice>, InputFeeder, SharedBuffer) {
    let device = LoopbackDevice::for_profile(&config.profile).with_think_frames(20);
    let (feeder, input) = channel();
    let out = SharedBuffer::new();
    let writer = GuiWriter::new(Box::new(out.clone()));
    (Bridge::new(config, device, input, writer), feeder, out)
}
