//! Move-time budgeting for unlimited-speed runs.
//!
//! In unlimited mode the device searches on its infinite level and the
//! bridge stops it by pressing ENT once the budget computed here runs out.
//! Every budget is reduced by the device delay, the wall time lost to key
//! entry and display read-back around each move. That delay scales with
//! how fast the host runs the emulation, which [`SpeedCalibration`]
//! measures once at startup.

use std::time::{Duration, Instant};

/// Expected number of moves left in a sudden-death game.
pub const MOVES_HORIZON: i64 = 35;

/// Wall milliseconds one emulated second took on the reference host.
pub const REFERENCE_MS_PER_SECOND: f64 = 94.0;

/// Timer ticks measured during calibration (ten emulated seconds).
pub const CALIBRATION_TICKS: u32 = 600;

/// Searches are never broken before this many milliseconds.
pub const MIN_SEARCH_MS: u64 = 100;

/// Frames between two budget checks while searching.
pub const TIME_CHECK_PERIOD: u32 = 100;

/// Safety margin subtracted from the increment when the regular budget
/// would exceed the clock.
const INCREMENT_MARGIN_MS: i64 = 500;

/// Floor added to the device delay when the clock has run out.
const EMERGENCY_MS: i64 = 100;

/// Clock state reported by the GUI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeControl {
    /// `st` or analysis budget. Takes precedence over the clocks.
    pub fixed_move_time_ms: Option<u64>,
    /// Remaining time on the device's clock (`time`).
    pub own_time_ms: i64,
    /// Remaining time on the opponent's clock (`otim`).
    pub opponent_time_ms: i64,
    pub increment_ms: i64,
    pub moves_to_go: u32,
    pub moves_to_go_start: u32,
    /// Budget of the running search.
    pub computed_move_time_ms: i64,
    pub search_start: Option<Instant>,
}

impl TimeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to "no time control".
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Budget for the next move. Pure: the clock state is not modified.
    pub fn compute_move_time(&self, device_delay_ms: i64) -> i64 {
        if let Some(fixed) = self.fixed_move_time_ms {
            return i64::try_from(fixed).unwrap_or(i64::MAX);
        }

        let mut remaining = self.own_time_ms;
        if self.moves_to_go > 0 {
            let moves = i64::from(self.moves_to_go);
            let reserve = moves.saturating_mul(device_delay_ms);
            if remaining - reserve > device_delay_ms {
                remaining -= reserve;
            }
            let mut move_time = remaining / moves;
            if self.moves_to_go == 1 {
                // Last move before the control.
                move_time -= move_time / 5;
            }
            return move_time.max(0);
        }

        let mut move_time =
            remaining / MOVES_HORIZON + self.increment_ms / 2 - device_delay_ms;
        if move_time >= remaining {
            move_time = self.increment_ms - INCREMENT_MARGIN_MS;
        }
        if move_time < 0 {
            move_time = EMERGENCY_MS + device_delay_ms;
        }
        move_time
    }

    /// Start the clock of a new search and fix its budget.
    pub fn start_search(&mut self, device_delay_ms: i64, now: Instant) {
        self.computed_move_time_ms = self.compute_move_time(device_delay_ms);
        self.search_start = Some(now);
        log::debug!(
            "move time {} ms (own {} ms, inc {} ms, mtg {})",
            self.computed_move_time_ms,
            self.own_time_ms,
            self.increment_ms,
            self.moves_to_go
        );
    }

    /// Budget exhausted. Never true within the first [`MIN_SEARCH_MS`].
    pub fn is_time_over(&self, now: Instant) -> bool {
        let Some(start) = self.search_start else {
            return false;
        };
        let used = now.saturating_duration_since(start);
        if used < Duration::from_millis(MIN_SEARCH_MS) {
            return false;
        }
        let budget = u64::try_from(self.computed_move_time_ms).unwrap_or(0);
        used > Duration::from_millis(budget)
    }

    /// A move was played on the device; count down towards the control.
    pub fn on_move_played(&mut self) {
        if self.moves_to_go > 0 {
            self.moves_to_go -= 1;
            if self.moves_to_go == 0 {
                self.moves_to_go = self.moves_to_go_start;
            }
        }
    }

    /// Moves taken back by `undo`/`remove`.
    pub fn on_moves_taken_back(&mut self, count: u32) {
        self.moves_to_go = self.moves_to_go.saturating_sub(count);
    }
}

/// Measures how long the host needs per emulated second.
#[derive(Debug, Clone)]
pub struct SpeedCalibration {
    ticks: u32,
    target_ticks: u32,
    started: Option<Instant>,
}

/// Outcome of a finished calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedReport {
    /// Wall milliseconds per emulated second.
    pub ms_per_second: u64,
    pub correction: f64,
}

impl SpeedCalibration {
    /// `target_ticks` of zero skips measuring.
    pub fn new(target_ticks: u32) -> Self {
        Self {
            ticks: 0,
            target_ticks,
            started: None,
        }
    }

    pub fn on_timer_tick(&mut self) {
        if self.started.is_some() {
            self.ticks = self.ticks.saturating_add(1);
        }
    }

    /// Advance the calibration. Returns the report once enough ticks have
    /// elapsed since the first call, or `Some(None)` when measuring was
    /// skipped.
    pub fn poll(&mut self, now: Instant) -> Option<Option<SpeedReport>> {
        if self.target_ticks == 0 {
            return Some(None);
        }
        let Some(start) = self.started else {
            self.started = Some(now);
            self.ticks = 0;
            return None;
        };
        if self.ticks < self.target_ticks {
            return None;
        }
        let elapsed = now.saturating_duration_since(start).as_millis();
        let emulated_seconds = u128::from(self.target_ticks / 60).max(1);
        let ms_per_second = u64::try_from(elapsed / emulated_seconds).unwrap_or(u64::MAX);
        Some(Some(SpeedReport {
            ms_per_second,
            correction: ms_per_second as f64 / REFERENCE_MS_PER_SECOND,
        }))
    }
}

/// Apply a calibration result to the profile's base delay.
pub fn corrected_delay(base_delay_ms: u32, correction: f64) -> u32 {
    let scaled = f64::from(base_delay_ms) * correction;
    if scaled.is_finite() && scaled > 0.0 {
        scaled.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_wins() {
        let tc = TimeControl {
            fixed_move_time_ms: Some(5000),
            own_time_ms: 1000,
            ..TimeControl::default()
        };
        assert_eq!(tc.compute_move_time(1000), 5000);
    }

    #[test]
    fn test_moves_to_go_reserves_entry_overhead() {
        let tc = TimeControl {
            own_time_ms: 120_000,
            moves_to_go: 10,
            ..TimeControl::default()
        };
        // 120000 - 10 * 1000 = 110000, / 10
        assert_eq!(tc.compute_move_time(1000), 11_000);
    }

    #[test]
    fn test_moves_to_go_keeps_clock_when_reserve_does_not_fit() {
        let tc = TimeControl {
            own_time_ms: 10_500,
            moves_to_go: 10,
            ..TimeControl::default()
        };
        assert_eq!(tc.compute_move_time(1000), 1050);
    }

    #[test]
    fn test_last_move_before_control_keeps_reserve() {
        let tc = TimeControl {
            own_time_ms: 11_000,
            moves_to_go: 1,
            ..TimeControl::default()
        };
        assert_eq!(tc.compute_move_time(1000), 8000);
    }

    #[test]
    fn test_sudden_death_with_increment() {
        let tc = TimeControl {
            own_time_ms: 350_000,
            increment_ms: 2000,
            ..TimeControl::default()
        };
        assert_eq!(tc.compute_move_time(1000), 10_000);
    }

    #[test]
    fn test_budget_above_clock_falls_back_to_increment() {
        let tc = TimeControl {
            own_time_ms: 1000,
            increment_ms: 3000,
            ..TimeControl::default()
        };
        // 1000/35 + 1500 - 0 = 1528 >= 1000
        assert_eq!(tc.compute_move_time(0), 2500);
    }

    #[test]
    fn test_negative_budget_is_floored() {
        let tc = TimeControl {
            own_time_ms: 3000,
            ..TimeControl::default()
        };
        assert_eq!(tc.compute_move_time(2000), 2100);
        assert!(tc.compute_move_time(2000) >= 0);
    }

    #[test]
    fn test_computing_twice_gives_same_budget() {
        let tc = TimeControl {
            own_time_ms: 60_000,
            moves_to_go: 20,
            increment_ms: 1000,
            ..TimeControl::default()
        };
        assert_eq!(tc.compute_move_time(600), tc.compute_move_time(600));
    }

    #[test]
    fn test_time_over_respects_minimum_search() {
        let mut tc = TimeControl {
            fixed_move_time_ms: Some(0),
            ..TimeControl::default()
        };
        let start = Instant::now();
        assert!(!tc.is_time_over(start));
        tc.start_search(0, start);
        assert!(!tc.is_time_over(start + Duration::from_millis(50)));
        assert!(tc.is_time_over(start + Duration::from_millis(150)));
    }

    #[test]
    fn test_moves_to_go_wraps_to_start() {
        let mut tc = TimeControl {
            moves_to_go: 1,
            moves_to_go_start: 40,
            ..TimeControl::default()
        };
        tc.on_move_played();
        assert_eq!(tc.moves_to_go, 40);
        tc.on_moves_taken_back(2);
        assert_eq!(tc.moves_to_go, 38);
        tc.on_moves_taken_back(100);
        assert_eq!(tc.moves_to_go, 0);
    }

    #[test]
    fn test_calibration_measures_ms_per_emulated_second() {
        let mut cal = SpeedCalibration::new(600);
        let start = Instant::now();
        assert_eq!(cal.poll(start), None);
        for _ in 0..599 {
            cal.on_timer_tick();
        }
        assert_eq!(cal.poll(start + Duration::from_millis(900)), None);
        cal.on_timer_tick();
        let report = cal.poll(start + Duration::from_millis(1880)).unwrap().unwrap();
        assert_eq!(report.ms_per_second, 188);
        assert!((report.correction - 2.0).abs() < 1e-9);
        assert_eq!(corrected_delay(1000, report.correction), 2000);
    }

    #[test]
    fn test_zero_tick_calibration_is_skipped() {
        let mut cal = SpeedCalibration::new(0);
        assert_eq!(cal.poll(Instant::now()), Some(None));
    }
}
