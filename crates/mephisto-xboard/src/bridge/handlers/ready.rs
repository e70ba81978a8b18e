use crate::bridge::context::BridgeContext;
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::input::Wait;
use crate::xboard::OutputError;

/// Wait for the next GUI line.
pub(crate) fn handle_driver_ready<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    if ctx.error {
        // Release the line that was in flight when the device failed.
        ctx.input.processed();
        ctx.error = false;
    }

    if ctx.input_check == 0 {
        ctx.input_check = ctx.config.profile.timings.input_check_period;
        let wait = input_wait(ctx);
        if ctx.input.poll(wait).is_some() {
            ctx.set_state(BridgeState::ParseInput);
        } else if ctx.input.is_closed() {
            log::info!("GUI input closed, shutting down");
            ctx.session.exit_requested = true;
        }
    }
    ctx.input_check = ctx.input_check.saturating_sub(1);
    Ok(())
}

/// Unlimited runs may suspend the whole loop on input; at device speed the
/// emulation keeps running so the device can ponder.
fn input_wait<D: Device>(ctx: &BridgeContext<D>) -> Wait {
    if ctx.config.block_on_input && ctx.config.profile.unlimited {
        Wait::Forever
    } else if ctx.config.input_poll_timeout.is_zero() {
        Wait::NoWait
    } else {
        Wait::Timeout(ctx.config.input_poll_timeout)
    }
}
