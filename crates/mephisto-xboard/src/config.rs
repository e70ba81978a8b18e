//! Bridge configuration.
//!
//! The profile comes from the driver table; command-line flags and an
//! optional TOML file adjust it. The file looks like:
//!
//! ```toml
//! [defaults]
//! input_wait = 20
//!
//! [drivers.mm50]
//! bestmove_wait = 120
//! max_key_repeats = 4
//! ```
//!
//! Driver tables win over `[defaults]`; command-line flags win over both.

use crate::error::ConfigError;
use crate::profile::{DeviceProfile, ProfileOverrides};
use crate::time_control::CALIBRATION_TICKS;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default position file read on the load trigger.
pub const DEFAULT_FEN_FILE: &str = "fen.txt";

/// How long DriverReady blocks on input per step when not blocking forever.
pub const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(12);

/// Contents of the override file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub defaults: ProfileOverrides,
    pub drivers: HashMap<String, ProfileOverrides>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `[defaults]`, then the table of the profile's driver.
    pub fn apply(&self, profile: &mut DeviceProfile) {
        profile.apply_overrides(&self.defaults);
        if let Some(driver) = self
            .drivers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(profile.driver))
            .map(|(_, o)| o)
        {
            profile.apply_overrides(driver);
        }
    }
}

/// Everything the bridge needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub profile: DeviceProfile,
    /// Operator-supplied device delay; skips speed calibration.
    pub tc_delay_override: Option<u32>,
    /// Timer ticks measured by the startup calibration.
    pub calibration_ticks: u32,
    pub fen_file: PathBuf,
    /// Suspend the loop on input while idle in unlimited mode.
    pub block_on_input: bool,
    pub input_poll_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(profile: DeviceProfile) -> Self {
        let block_on_input = profile.unlimited;
        Self {
            profile,
            tc_delay_override: None,
            calibration_ticks: CALIBRATION_TICKS,
            fen_file: PathBuf::from(DEFAULT_FEN_FILE),
            block_on_input,
            input_poll_timeout: INPUT_POLL_TIMEOUT,
        }
    }

    /// Resolve `driver` and apply the optional override file.
    pub fn for_driver(
        driver: &str,
        unlimited: bool,
        overrides: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut profile = DeviceProfile::lookup(driver, unlimited)?;
        if let Some(path) = overrides {
            ConfigFile::load(path)?.apply(&mut profile);
            log::info!("Applied overrides from {}", path.display());
        }
        Ok(Self::new(profile))
    }

    pub fn with_clock(mut self, hz: u32) -> Self {
        self.profile.clock_hz = hz;
        self
    }

    pub fn with_tc_delay(mut self, ms: u32) -> Self {
        self.tc_delay_override = Some(ms);
        self
    }

    pub fn with_fen_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fen_file = path.into();
        self
    }

    pub fn with_blocking_input(mut self, block: bool) -> Self {
        self.block_on_input = block;
        self
    }

    /// Ticks the startup calibration runs for. Calibration only happens in
    /// unlimited mode without an explicit delay.
    pub fn effective_calibration_ticks(&self) -> u32 {
        if self.profile.unlimited && self.tc_delay_override.is_none() {
            self.calibration_ticks
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_driver_table_wins_over_defaults() {
        let file = ConfigFile::parse(
            r#"
            [defaults]
            input_wait = 20
            bestmove_wait = 10

            [drivers.MM50]
            bestmove_wait = 120
            max_key_repeats = 4
            "#,
            Path::new("test.toml"),
        )
        .unwrap();

        let mut profile = DeviceProfile::lookup("mm50", true).unwrap();
        file.apply(&mut profile);
        assert_eq!(profile.timings.input_wait, 20);
        assert_eq!(profile.timings.bestmove_wait, 120);
        assert_eq!(profile.max_key_repeats, 4);
        // Untouched fields keep the profile value.
        assert_eq!(profile.timings.special_wait, 300);

        let mut other = DeviceProfile::lookup("glasgow", true).unwrap();
        file.apply(&mut other);
        assert_eq!(other.timings.bestmove_wait, 10);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ConfigFile::parse("[defaults]\nbogus = 1\n", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_for_driver_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ninput_timeout = 7").unwrap();
        let config = BridgeConfig::for_driver("dallas", false, Some(file.path())).unwrap();
        assert_eq!(config.profile.timings.input_timeout, 7);
        assert!(!config.block_on_input);
        assert_eq!(config.effective_calibration_ticks(), 0);

        let missing = BridgeConfig::for_driver("dallas", false, Some(Path::new("/nonexistent.toml")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
        assert!(BridgeConfig::for_driver("nope", true, None).is_err());
    }

    #[test]
    fn test_explicit_delay_skips_calibration() {
        let config = BridgeConfig::for_driver("mm50", true, None).unwrap();
        assert_eq!(config.effective_calibration_ticks(), CALIBRATION_TICKS);
        assert!(config.block_on_input);
        let config = config.with_tc_delay(500).with_clock(2_000_000);
        assert_eq!(config.effective_calibration_ticks(), 0);
        assert_eq!(config.profile.clock_hz, 2_000_000);
    }
}
