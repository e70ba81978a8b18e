use super::send_level_list;
use crate::bridge::context::{BridgeContext, KeyCommand};
use crate::bridge::state::BridgeState;
use crate::device::Device;
use crate::fen::{parse_fen, setboard_keys, Position};
use crate::input::Wait;
use crate::xboard::{parse_xboard_command, LevelParams, OutputError, XboardCommand, XboardResponse};

/// Interpret the held GUI line and turn it into device keys.
pub(crate) fn handle_parse_input<D: Device>(
    ctx: &mut BridgeContext<D>,
) -> Result<(), OutputError> {
    let Some(line) = ctx.input.poll(Wait::NoWait).map(str::to_owned) else {
        ctx.set_state(BridgeState::DriverReady);
        return Ok(());
    };
    ctx.out.record_input(&line);
    ctx.command = KeyCommand::default();

    if !ctx.config.profile.unlimited {
        let hz = ctx.config.profile.input_clock_hz;
        ctx.device.set_clock_hz(hz);
    }

    let command = match parse_xboard_command(&line) {
        Ok(command) => command,
        Err(e) => {
            log::debug!("Ignoring '{line}': {e:#}");
            ctx.finish_input();
            return Ok(());
        }
    };

    let keys = translate(ctx, command)?;
    if keys.is_empty() {
        ctx.finish_input();
    } else {
        log::debug!("keys: {}", keys.keys());
        ctx.command = keys;
        ctx.set_state(BridgeState::SendCommand);
    }
    Ok(())
}

/// Apply the session side effects of `command` and build its key sequence.
fn translate<D: Device>(
    ctx: &mut BridgeContext<D>,
    command: XboardCommand,
) -> Result<KeyCommand, OutputError> {
    let profile = ctx.config.profile.clone();
    let templates = profile.templates;
    let mut cmd = KeyCommand::default();

    match command {
        XboardCommand::Xboard => ctx.session.xboard = true,
        XboardCommand::Protover(version) => {
            if version >= 2 {
                ctx.out.send(XboardResponse::Features {
                    name: profile.name.to_string(),
                })?;
            }
        }
        XboardCommand::Ping(id) => {
            ctx.out.send(XboardResponse::Pong(id))?;
            cmd = roll_display(ctx);
        }
        XboardCommand::New => {
            ctx.device.soft_reset();
            if profile.rolling_exists {
                ctx.session.rolling_active = false;
            }
            ctx.session.force = false;
            ctx.session.analysis = false;
            ctx.session.position = Position::default();
            ctx.session.side_to_move = ctx.session.position.side_to_move;
            ctx.tc.clear();
            ctx.info.reset();
        }
        XboardCommand::Post => {
            ctx.session.post = true;
            cmd = roll_display(ctx);
        }
        XboardCommand::NoPost => ctx.session.post = false,
        XboardCommand::Easy | XboardCommand::Hard => {
            if profile.unlimited {
                cmd = infinite_level(ctx);
            }
        }
        XboardCommand::Force => {
            if !ctx.session.force {
                cmd = KeyCommand::new(templates.force);
                ctx.session.force = true;
            }
        }
        XboardCommand::SetBoard(fen) => {
            let result = parse_fen(&fen).and_then(|position| {
                setboard_keys(&position, &templates, ctx.session.force).map(|k| (position, k))
            });
            match result {
                Ok((position, keys)) => {
                    ctx.session.side_to_move = position.side_to_move;
                    ctx.session.position = position;
                    cmd = KeyCommand::new(&keys);
                }
                Err(e) => log::debug!("setboard rejected: {e}"),
            }
        }
        XboardCommand::Time(cs) => ctx.tc.own_time_ms = cs.saturating_mul(10),
        XboardCommand::Otim(cs) => ctx.tc.opponent_time_ms = cs.saturating_mul(10),
        XboardCommand::St(seconds) => {
            if profile.unlimited {
                ctx.tc.clear();
                ctx.tc.fixed_move_time_ms = Some(u64::from(seconds) * 1000);
                cmd = infinite_level(ctx);
            } else if let Some(keys) = templates.fixed_time(seconds) {
                cmd = KeyCommand::new(keys);
                ctx.session.analysis = false;
            } else {
                unsupported_time_control(ctx)?;
            }
            wrap_in_force(ctx, &mut cmd);
        }
        XboardCommand::Level(level) => {
            if profile.unlimited {
                ctx.tc.clear();
                ctx.tc.moves_to_go = level.moves;
                ctx.tc.moves_to_go_start = level.moves;
                ctx.tc.increment_ms = i64::from(level.increment) * 1000;
                cmd = infinite_level(ctx);
            } else {
                match normal_level(&level, &templates) {
                    Some((keys, analysis)) => {
                        cmd = KeyCommand::new(keys);
                        ctx.session.analysis = analysis;
                    }
                    None => unsupported_time_control(ctx)?,
                }
            }
            wrap_in_force(ctx, &mut cmd);
        }
        XboardCommand::Analyze => {
            let mut keys = String::new();
            if ctx.session.force {
                keys.push('r');
                ctx.session.force = false;
            }
            if profile.unlimited {
                ctx.tc.clear();
                ctx.tc.fixed_move_time_ms = Some(u64::MAX);
                keys.push_str(&infinite_level(ctx).keys());
                keys.push('s');
            } else {
                keys.push_str(templates.analyze);
                ctx.session.analysis = true;
            }
            cmd = KeyCommand::new(&keys);
            cmd.starts_search = true;
        }
        XboardCommand::Undo => {
            cmd = KeyCommand::new(if ctx.session.force { "9" } else { templates.undo });
            ctx.tc.on_moves_taken_back(1);
            ctx.session.flip_side();
        }
        XboardCommand::Remove => {
            let keys = if ctx.session.force {
                templates.remove.get(1..).unwrap_or_default()
            } else {
                templates.remove
            };
            cmd = KeyCommand::new(keys);
            ctx.tc.on_moves_taken_back(2);
        }
        XboardCommand::Go => {
            let keys = if ctx.session.force {
                ctx.session.force = false;
                "rs"
            } else {
                "s"
            };
            cmd = KeyCommand::new(keys);
            cmd.starts_search = true;
        }
        XboardCommand::Quit => {
            log::info!("quit received");
            ctx.session.exit_requested = true;
        }
        XboardCommand::Move(mv) => cmd = move_keys(ctx, &mv),
        XboardCommand::Keys(keys) => cmd = KeyCommand::new(&keys),
        XboardCommand::GetClock => {
            let hz = ctx.device.clock_hz();
            ctx.operator(format!("Clock: {hz} Hz"))?;
        }
        XboardCommand::SetClock(hz) => {
            ctx.device.set_clock_hz(hz);
            ctx.operator(format!("Clock set to {hz} Hz"))?;
        }
        // Only meaningful while searching; idle they are no-ops.
        XboardCommand::Exit | XboardCommand::MoveNow | XboardCommand::Status => {}
    }
    Ok(cmd)
}

/// Keys entering a GUI move, with the promotion piece confirmed separately.
fn move_keys<D: Device>(ctx: &mut BridgeContext<D>, mv: &str) -> KeyCommand {
    let templates = ctx.config.profile.templates;
    let mut keys: String = mv.chars().take(4).collect();
    let promotion = mv
        .chars()
        .nth(4)
        .and_then(|piece| templates.promotion_key(piece));
    if let Some(key) = promotion {
        keys.push('s');
        keys.push(key);
    }
    keys.push('s');

    let mut cmd = KeyCommand::new(&keys);
    cmd.promotion_move = promotion.is_some();
    cmd.starts_search = !ctx.session.force;
    ctx.session.flip_side();
    cmd
}

/// Switch the rolling search display on once.
fn roll_display<D: Device>(ctx: &mut BridgeContext<D>) -> KeyCommand {
    let keys = ctx.config.profile.templates.roll_display;
    if keys.is_empty() || ctx.session.rolling_active {
        return KeyCommand::default();
    }
    ctx.session.rolling_active = true;
    KeyCommand::new(keys)
}

/// The infinite level, unless the device is already on it.
fn infinite_level<D: Device>(ctx: &mut BridgeContext<D>) -> KeyCommand {
    if ctx.session.analysis {
        return KeyCommand::default();
    }
    ctx.session.analysis = true;
    KeyCommand::new(ctx.config.profile.templates.infinite)
}

/// Level keys only take effect outside memo mode.
fn wrap_in_force<D: Device>(ctx: &BridgeContext<D>, cmd: &mut KeyCommand) {
    if ctx.session.force && !cmd.is_empty() {
        *cmd = KeyCommand::new(&format!("r{}m", cmd.keys()));
    }
}

/// Device level for `level` at original speed, and whether it is the
/// infinite level. The device levels have no increment, so it is ignored;
/// a `MIN:SEC` base never matches a level.
fn normal_level(
    level: &LevelParams,
    templates: &crate::profile::CommandTemplates,
) -> Option<(&'static str, bool)> {
    if level.base_seconds != 0 {
        return None;
    }
    match (level.moves, level.base_minutes) {
        (40, 120) => Some((templates.tournament, false)),
        (0, 9999) => Some((templates.infinite, true)),
        (0, minutes) => templates.blitz(minutes).map(|keys| (keys, false)),
        _ => None,
    }
    .filter(|(keys, _)| !keys.is_empty())
}

fn unsupported_time_control<D: Device>(ctx: &mut BridgeContext<D>) -> Result<(), OutputError> {
    log::warn!("unsupported time control, keeping the current level");
    ctx.operator("Time control not supported - default level used !!!")?;
    send_level_list(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::DeviceProfile;

    fn level(moves: u32, base_minutes: u32, increment: u32) -> LevelParams {
        LevelParams {
            moves,
            base_minutes,
            base_seconds: 0,
            increment,
        }
    }

    #[test]
    fn test_normal_levels_follow_templates() {
        let mm = DeviceProfile::lookup("mm50", false).unwrap().templates;
        assert_eq!(normal_level(&level(40, 120, 0), &mm), Some(("l6s", false)));
        assert_eq!(normal_level(&level(0, 9999, 0), &mm), Some(("l9s", true)));
        assert_eq!(normal_level(&level(0, 5, 0), &mm), Some(("ll1s", false)));
        assert_eq!(normal_level(&level(0, 7, 0), &mm), None);
        assert_eq!(normal_level(&level(40, 120, 2), &mm), Some(("l6s", false)));
        assert_eq!(normal_level(&level(0, 10, 5), &mm), Some(("ll4s", false)));
        let with_seconds = LevelParams {
            base_seconds: 30,
            ..level(0, 5, 0)
        };
        assert_eq!(normal_level(&with_seconds, &mm), None);

        let glasgow = DeviceProfile::lookup("glasgow", false).unwrap().templates;
        assert_eq!(normal_level(&level(0, 5, 0), &glasgow), None);
    }
}
