//! One handler per bridge state.

mod bestmove;
mod parse;
mod ready;
mod search;
mod send;
mod special;
mod start;

pub(crate) use bestmove::check_best_move;
pub(crate) use search::handle_device_error;

use super::context::BridgeContext;
use super::state::BridgeState;
use crate::device::Device;
use crate::xboard::OutputError;

/// Lines of the operator level list.
pub(crate) const LEVEL_LIST: [&str; 8] = [
    "Supported Levels:",
    "Level 0: 3   seconds/move   -> st 3",
    "Level 1: 5   seconds/move   -> st 5",
    "Level 2: 10  seconds/move   -> st 10",
    "Level 3: 20  seconds/move   -> st 20",
    "Level 4: 60  seconds/move   -> st 60",
    "Level 5: 120 seconds/move   -> st 120",
    "Level 6: 40 move in 2 hours -> level 40 120 0",
];

/// Run the handler of the current state once.
pub(crate) fn dispatch<D: Device>(ctx: &mut BridgeContext<D>) -> Result<(), OutputError> {
    match ctx.state {
        BridgeState::DriverStart => start::handle_driver_start(ctx),
        BridgeState::DriverReady => ready::handle_driver_ready(ctx),
        BridgeState::ParseInput => parse::handle_parse_input(ctx),
        BridgeState::SendCommand => send::handle_send_command(ctx),
        BridgeState::SpecialCommands => special::handle_special_commands(ctx),
        BridgeState::Searching => search::handle_searching(ctx),
        BridgeState::BestMove => bestmove::handle_best_move(ctx),
        BridgeState::BestMovePromo => bestmove::handle_best_move_promo(ctx),
    }
}

pub(crate) fn send_level_list<D: Device>(ctx: &mut BridgeContext<D>) -> Result<(), OutputError> {
    for line in LEVEL_LIST {
        ctx.operator(line)?;
    }
    Ok(())
}

/// `<file><rank><file><rank>` reaching the last rank from the one before.
pub(crate) fn is_promotion_move(mv: &str) -> bool {
    let b = mv.as_bytes();
    b.len() >= 4 && ((b[1] == b'7' && b[3] == b'8') || (b[1] == b'2' && b[3] == b'1'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_moves_are_recognised() {
        assert!(is_promotion_move("e7e8"));
        assert!(is_promotion_move("a2b1"));
        assert!(!is_promotion_move("e7e6"));
        assert!(!is_promotion_move("e8e7"));
        assert!(!is_promotion_move("e7"));
    }
}
