use super::is_promotion_move;
use crate::bridge::context::{BridgeContext, KeyCommand, BESTMOVE_RETRIES};
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::display::{DisplayText, GameEnd};
use crate::xboard::{OutputError, XboardResponse};

/// Timer-driven check for the end of a search. Waits out the settle window
/// after the device's end signal, then reads the display.
pub(crate) fn check_best_move<D: Device>(ctx: &mut BridgeContext<D>) -> Result<(), OutputError> {
    if ctx.state != BridgeState::Searching || !ctx.best.search_done {
        return Ok(());
    }
    if ctx.best.delay > 0 {
        ctx.best.delay -= 1;
        return Ok(());
    }

    let shown = ctx.display.text();
    if shown.is_move() {
        ctx.set_state(BridgeState::BestMove);
        return Ok(());
    }

    let bestmove_wait = ctx.config.profile.timings.bestmove_wait;
    match shown.game_end() {
        Some(GameEnd::Mate) => {
            log::info!("device reports mate ('{shown}')");
            finish_with(ctx, XboardResponse::Resign)
        }
        Some(GameEnd::Draw) => {
            log::info!("device claims a draw ('{shown}')");
            finish_with(ctx, XboardResponse::Draw)
        }
        None if ctx.best.retries < BESTMOVE_RETRIES => {
            ctx.best.retries += 1;
            ctx.best.delay = bestmove_wait;
            log::debug!("no move on display ('{shown}'), retry {}", ctx.best.retries);
            Ok(())
        }
        None => {
            log::warn!("no move after {BESTMOVE_RETRIES} retries ('{shown}'), resigning");
            finish_with(ctx, XboardResponse::Resign)
        }
    }
}

fn finish_with<D: Device>(
    ctx: &mut BridgeContext<D>,
    response: XboardResponse,
) -> Result<(), OutputError> {
    ctx.best = Default::default();
    ctx.info.reset();
    ctx.set_state(BridgeState::DriverReady);
    ctx.out.send(response)
}

/// Report the device's move, asking for the promotion piece first when the
/// move reaches the last rank.
pub(crate) fn handle_best_move<D: Device>(ctx: &mut BridgeContext<D>) -> Result<(), OutputError> {
    ctx.info.reset();
    if ctx.config.profile.unlimited {
        ctx.tc.on_move_played();
    }

    let mv = ctx.display.text().to_move();
    ctx.best = Default::default();
    ctx.best.mv = mv.clone();

    let query = ctx.config.profile.templates.show_promotion;
    if is_promotion_move(&mv) && !query.is_empty() {
        log::debug!("{mv} may promote, asking the device");
        ctx.command = KeyCommand::new(query);
        ctx.port.wait_ticks = 0;
        ctx.set_state(BridgeState::BestMovePromo);
        return Ok(());
    }

    ctx.session.flip_side();
    ctx.set_state(BridgeState::DriverReady);
    ctx.out.send(XboardResponse::Move(mv))
}

/// Run the promotion query and report the completed move.
pub(crate) fn handle_best_move_promo<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    let promo_wait = ctx.config.profile.timings.promo_wait;
    if !ctx.port.ready || ctx.port.wait_ticks <= promo_wait {
        return Ok(());
    }

    if !ctx.command.exhausted() {
        let shown = ctx.display.text();
        if let Some(letter) = promotion_letter(shown) {
            ctx.best.promotion = Some(letter);
            ctx.command.jump_to_last();
        } else if shown.as_str() == "____" {
            ctx.best.no_promotion = true;
            ctx.command.jump_to_last();
        }
        if let Some(key) = ctx.command.current() {
            ctx.press(key);
            ctx.command.advance();
        }
        return Ok(());
    }

    let mv = std::mem::take(&mut ctx.best.mv);
    let response = if let Some(letter) = ctx.best.promotion {
        XboardResponse::Move(format!("{mv}{letter}"))
    } else if ctx.best.no_promotion {
        XboardResponse::Move(mv)
    } else if ctx.best.queries < ctx.config.profile.max_key_repeats {
        ctx.best.queries += 1;
        ctx.best.mv = mv;
        log::info!("Repeat promotion query ({})", ctx.best.queries);
        ctx.command.restart();
        return Ok(());
    } else {
        log::warn!("promotion piece of {mv} never shown, resigning");
        return finish_with(ctx, XboardResponse::Resign);
    };

    ctx.best = Default::default();
    ctx.session.flip_side();
    ctx.set_state(BridgeState::DriverReady);
    ctx.out.send(response)
}

/// `Pr <glyph>` to a CECP promotion letter.
fn promotion_letter(shown: DisplayText) -> Option<char> {
    let text = shown.as_str();
    if !text.starts_with("Pr ") {
        return None;
    }
    match shown.char_at(3).to_ascii_lowercase() {
        'd' => Some('q'),
        't' => Some('r'),
        'l' => Some('b'),
        '5' => Some('n'),
        _ => None,
    }
}
