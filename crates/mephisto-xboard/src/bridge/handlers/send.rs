use crate::bridge::context::{BridgeContext, SpecialKey};
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::time_control::TIME_CHECK_PERIOD;
use crate::xboard::OutputError;
use std::time::Instant;

/// Feed the next key once the device took the previous one.
pub(crate) fn handle_send_command<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    if ctx.command.exhausted() {
        ctx.finish_input();
        return Ok(());
    }

    let input_wait = ctx.config.profile.timings.input_wait;
    if ctx.port.ready && ctx.port.wait_ticks > input_wait {
        if let Some(key) = ctx.command.current() {
            ctx.press(key);
            if ctx.command.starts_search && ctx.command.is_last() {
                begin_search(ctx);
            }
            let special = special_key(ctx, key);
            ctx.command.advance();
            if let Some(special) = special {
                if ctx.state != BridgeState::Searching {
                    ctx.special = Some(special);
                    ctx.set_state(BridgeState::SpecialCommands);
                }
            }
        }
    }

    if ctx.command.exhausted() && ctx.state == BridgeState::Searching {
        ctx.input.processed();
        if !ctx.config.profile.unlimited {
            let hz = ctx.config.profile.clock_hz;
            ctx.device.set_clock_hz(hz);
        }
    }
    Ok(())
}

fn special_key<D: Device>(ctx: &BridgeContext<D>, key: char) -> Option<SpecialKey> {
    match key {
        'm' => Some(SpecialKey::Memo),
        '9' => Some(SpecialKey::Nine),
        k if ctx.command.index() > 4
            && ctx.command.promotion_move
            && ctx.config.profile.templates.is_promotion_key(k) =>
        {
            Some(SpecialKey::PromoPiece)
        }
        _ => None,
    }
}

/// The key just sent starts the device's search.
fn begin_search<D: Device>(ctx: &mut BridgeContext<D>) {
    let timings = ctx.config.profile.timings;
    ctx.set_state(BridgeState::Searching);
    ctx.session.break_search = false;
    ctx.tc.start_search(i64::from(ctx.tc_delay_ms), Instant::now());
    ctx.info.reset();
    ctx.best.arm(timings.bestmove_wait);
    ctx.input_check = timings.input_check_period;
    ctx.time_check = TIME_CHECK_PERIOD;
}
