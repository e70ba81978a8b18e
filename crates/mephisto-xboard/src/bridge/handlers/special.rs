use crate::bridge::context::{BridgeContext, SpecialKey};
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::xboard::OutputError;

/// Display text confirming MEM.
const MEMO_CONFIRMATION: &str = "MEM0";

/// Display text while the device still waits for the promotion piece.
const AWAITING_PIECE: &str = "Pr _";

/// Check a key whose acknowledgement can lag behind the latch and send it
/// again while the display shows no effect.
pub(crate) fn handle_special_commands<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    let timings = ctx.config.profile.timings;
    if ctx.port.wait_ticks <= timings.special_wait {
        return Ok(());
    }

    let shown = ctx.display.text();
    let unconfirmed = match ctx.special {
        Some(SpecialKey::Memo) => shown.as_str() != MEMO_CONFIRMATION,
        Some(SpecialKey::PromoPiece) => shown.as_str() == AWAITING_PIECE,
        Some(SpecialKey::Nine) | None => false,
    };

    if unconfirmed && ctx.port.ready {
        let max = ctx.config.profile.max_key_repeats;
        if ctx.command.repeat(max) {
            log::info!("Repeat key ({:?}), display '{shown}'", ctx.special);
        } else {
            log::warn!("{:?} not confirmed after {max} repeats, continuing", ctx.special);
            ctx.command.settle();
        }
    } else {
        ctx.command.settle();
    }

    ctx.special = None;
    ctx.set_state(BridgeState::SendCommand);
    Ok(())
}
