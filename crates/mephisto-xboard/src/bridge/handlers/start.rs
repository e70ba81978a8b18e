use super::send_level_list;
use crate::bridge::context::BridgeContext;
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::time_control::{corrected_delay, REFERENCE_MS_PER_SECOND};
use crate::xboard::OutputError;
use std::time::Instant;

/// Wait for the speed calibration, fix the device delay and greet the
/// operator.
pub(crate) fn handle_driver_start<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    let Some(report) = ctx.calibration.poll(Instant::now()) else {
        return Ok(());
    };

    let profile = ctx.config.profile.clone();
    ctx.tc_delay_ms = match (ctx.config.tc_delay_override, report) {
        (Some(ms), _) => ms,
        (None, Some(report)) => corrected_delay(profile.tc_delay_ms, report.correction),
        (None, None) => profile.tc_delay_ms,
    };

    ctx.operator(profile.name)?;
    ctx.operator(format!("Emulator org. clock : {}", profile.original_clock_hz))?;
    ctx.operator(format!("Emulator curr.clock : {}", ctx.device.clock_hz()))?;
    ctx.operator(format!(
        "Speed factor clock  : {:.2}",
        f64::from(ctx.device.clock_hz()) / f64::from(profile.original_clock_hz.max(1))
    ))?;

    if profile.unlimited {
        if let Some(report) = report {
            ctx.operator(format!("Time in ms for 1 sec: {}", report.ms_per_second))?;
            ctx.operator(format!(
                "ReferenceTimePerSec : {REFERENCE_MS_PER_SECOND} (This system has: {})",
                report.ms_per_second
            ))?;
            ctx.operator(format!("Factor time corr.   : {:.2}", report.correction))?;
        }
        ctx.operator(format!("tc_delay (ms)       : {}", ctx.tc_delay_ms))?;
    } else {
        send_level_list(ctx)?;
    }

    log::info!(
        "{} ready, clock {} Hz, tc_delay {} ms",
        profile.driver,
        ctx.device.clock_hz(),
        ctx.tc_delay_ms
    );
    ctx.set_state(BridgeState::DriverReady);
    Ok(())
}
