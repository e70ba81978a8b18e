use crate::bridge::context::BridgeContext;
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::input::Wait;
use crate::time_control::TIME_CHECK_PERIOD;
use crate::xboard::OutputError;
use std::time::Instant;

/// ENT on every supported model.
const BREAK_KEY: char = 's';

/// Watch for GUI interrupts and the move budget while the device thinks.
pub(crate) fn handle_searching<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    if ctx.input_check == 0 {
        ctx.input_check = ctx.config.profile.timings.input_check_period;
        if !ctx.session.break_search {
            check_interrupt(ctx);
            if ctx.state != BridgeState::Searching {
                return Ok(());
            }
        }
    }
    ctx.input_check = ctx.input_check.saturating_sub(1);

    if ctx.config.profile.unlimited {
        if ctx.time_check == 0 && !ctx.session.break_search {
            ctx.time_check = TIME_CHECK_PERIOD;
            if ctx.tc.is_time_over(Instant::now()) {
                log::debug!("move time {} ms used up", ctx.tc.computed_move_time_ms);
                break_search(ctx);
            }
        }
        ctx.time_check = ctx.time_check.saturating_sub(1);
    }
    Ok(())
}

fn check_interrupt<D: Device>(ctx: &mut BridgeContext<D>) {
    let Some(line) = ctx.input.poll(Wait::NoWait).map(str::to_owned) else {
        if ctx.input.is_closed() {
            log::info!("GUI input closed during search");
            break_search(ctx);
            ctx.session.exit_requested = true;
            ctx.set_state(BridgeState::DriverReady);
        }
        return;
    };

    match line.trim() {
        "?" | "exit" => {
            ctx.out.record_input(&format!("{line} ->Search break"));
            break_search(ctx);
            ctx.input.processed();
        }
        "." => ctx.input.processed(),
        "quit" => {
            ctx.out.record_input(&format!("{line} ->Search quit"));
            break_search(ctx);
            ctx.session.exit_requested = true;
            ctx.finish_input();
        }
        // Anything else waits for the search to end.
        _ => {}
    }
}

fn break_search<D: Device>(ctx: &mut BridgeContext<D>) {
    ctx.press(BREAK_KEY);
    ctx.session.break_search = true;
}

/// The device showed `Err1`..`Err3`. Give up on the current command so the
/// GUI is not left waiting.
pub(crate) fn handle_device_error<D: Device>(ctx: &mut BridgeContext<D>, code: u8) {
    log::warn!("Device error Err{code} in state {}", ctx.state);
    ctx.error = true;
    for &line in ctx.config.profile.layout.lines() {
        ctx.device.clear_key(line);
    }
    ctx.port.key_down = None;
    ctx.port.ready = true;
    ctx.command = Default::default();
    ctx.special = None;
    ctx.set_state(BridgeState::DriverReady);
}
