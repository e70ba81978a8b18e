//! Host loop pacing the device and the bridge.
//!
//! Each frame the bridge steps once, the device runs one video frame
//! whose events go back to the bridge, and the 60 Hz timer advances. At
//! original speed frames are throttled to real time; unlimited runs go as
//! fast as the host allows.

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::device::Device;
use crate::error::BridgeError;
use std::thread;
use std::time::{Duration, Instant};

/// One frame of the 60 Hz device timer.
pub const FRAME_PERIOD: Duration = Duration::from_micros(16_667);

#[derive(Debug, Clone)]
pub struct Runner {
    frame_period: Option<Duration>,
    frames: u64,
}

impl Runner {
    /// Throttled at original speed, free-running in unlimited mode.
    pub fn for_config(config: &BridgeConfig) -> Self {
        Self {
            frame_period: (!config.profile.unlimited).then_some(FRAME_PERIOD),
            frames: 0,
        }
    }

    pub fn unthrottled() -> Self {
        Self {
            frame_period: None,
            frames: 0,
        }
    }

    /// Frames run so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn run_frame<D: Device>(&mut self, bridge: &mut Bridge<D>) -> Result<(), BridgeError> {
        let started = Instant::now();

        bridge.step()?;
        let events = bridge.device_mut().run_frame();
        for event in events {
            bridge.on_device_event(event)?;
        }
        bridge.on_timer_tick()?;
        self.frames += 1;

        if let Some(period) = self.frame_period {
            let elapsed = started.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
        Ok(())
    }

    /// Run until the bridge has been told to quit.
    pub fn run<D: Device>(&mut self, bridge: &mut Bridge<D>) -> Result<(), BridgeError> {
        while !bridge.is_finished() {
            self.run_frame(bridge)?;
        }
        log::debug!("bridge finished after {} frames", self.frames);
        Ok(())
    }

    /// Run until `done` holds or `max_frames` more frames have passed.
    /// Returns whether `done` was reached.
    pub fn run_until<D, F>(
        &mut self,
        bridge: &mut Bridge<D>,
        max_frames: u64,
        mut done: F,
    ) -> Result<bool, BridgeError>
    where
        D: Device,
        F: FnMut(&Bridge<D>) -> bool,
    {
        for _ in 0..max_frames {
            if done(bridge) {
                return Ok(true);
            }
            if bridge.is_finished() {
                return Ok(false);
            }
            self.run_frame(bridge)?;
        }
        Ok(done(bridge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeState;
    use crate::test_helpers::{loopback_bridge, quick_config};

    #[test]
    fn test_runs_until_quit() {
        let (mut bridge, feeder, _out) = loopback_bridge(quick_config("mm50"));
        let mut runner = Runner::unthrottled();
        assert!(runner
            .run_until(&mut bridge, 10, |b| b.state() == BridgeState::DriverReady)
            .unwrap());

        feeder.submit("quit").unwrap();
        runner.run(&mut bridge).unwrap();
        assert!(bridge.is_finished());
        assert!(runner.frames() > 0);
    }

    #[test]
    fn test_closed_input_ends_the_loop() {
        let (mut bridge, feeder, _out) = loopback_bridge(quick_config("glasgow"));
        drop(feeder);
        let mut runner = Runner::unthrottled();
        assert!(!runner.run_until(&mut bridge, 100, |_| false).unwrap());
        assert!(bridge.is_finished());
    }

    #[test]
    fn test_normal_speed_is_throttled() {
        let config = quick_config("mm50");
        assert!(Runner::for_config(&config).frame_period.is_none());
        let normal = BridgeConfig::for_driver("mm50", false, None).unwrap();
        assert_eq!(Runner::for_config(&normal).frame_period, Some(FRAME_PERIOD));
    }
}
