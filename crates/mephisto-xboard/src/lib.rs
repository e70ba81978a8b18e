//! CECP/Xboard bridge for emulated Mephisto chess computers.
//!
//! The bridge turns GUI protocol lines into simulated key presses on the
//! device keypad, watches the 4-digit LCD for the firmware's answer and
//! reports moves and search status back to the GUI.

pub mod bridge;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod fen;
pub mod input;
pub mod keymap;
pub mod profile;
pub mod runner;
pub mod telemetry;
pub mod time_control;
pub mod transcript;
pub mod xboard;

#[cfg(test)]
mod test_helpers;

pub use bridge::{Bridge, BridgeState};
pub use config::BridgeConfig;
pub use device::{Device, DeviceEvent, LoopbackDevice};
pub use profile::DeviceProfile;
