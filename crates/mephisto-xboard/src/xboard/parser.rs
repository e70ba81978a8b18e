//! CECP command parser

use super::commands::{LevelParams, XboardCommand};
use crate::display::is_coordinate_move;
use anyhow::{anyhow, Context, Result};

/// Parse one GUI line.
pub fn parse_xboard_command(line: &str) -> Result<XboardCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    match parts[0] {
        "xboard" => Ok(XboardCommand::Xboard),
        "protover" => {
            let version = number::<u32>(&parts, 1, "protover")?;
            Ok(XboardCommand::Protover(version))
        }
        "ping" => Ok(XboardCommand::Ping(parts.get(1).copied().unwrap_or("").to_string())),
        "new" => Ok(XboardCommand::New),
        "post" => Ok(XboardCommand::Post),
        "nopost" => Ok(XboardCommand::NoPost),
        "easy" => Ok(XboardCommand::Easy),
        "hard" => Ok(XboardCommand::Hard),
        "force" => Ok(XboardCommand::Force),
        "setboard" => {
            if parts.len() < 2 {
                return Err(anyhow!("setboard without FEN"));
            }
            Ok(XboardCommand::SetBoard(parts[1..].join(" ")))
        }
        "time" => Ok(XboardCommand::Time(number(&parts, 1, "time")?)),
        "otim" => Ok(XboardCommand::Otim(number(&parts, 1, "otim")?)),
        "st" => Ok(XboardCommand::St(number(&parts, 1, "st")?)),
        "level" => parse_level(&parts[1..]),
        "analyze" => Ok(XboardCommand::Analyze),
        "exit" => Ok(XboardCommand::Exit),
        "?" => Ok(XboardCommand::MoveNow),
        "." => Ok(XboardCommand::Status),
        "undo" => Ok(XboardCommand::Undo),
        "remove" => Ok(XboardCommand::Remove),
        "go" => Ok(XboardCommand::Go),
        "quit" => Ok(XboardCommand::Quit),
        "cmd" => match parts.get(1) {
            Some(keys) => Ok(XboardCommand::Keys((*keys).to_string())),
            None => Err(anyhow!("cmd without keys")),
        },
        "get_clock" => Ok(XboardCommand::GetClock),
        "set_clock" => Ok(XboardCommand::SetClock(number(&parts, 1, "set_clock")?)),
        "usermove" => parse_move(parts.get(1).copied().unwrap_or("")),
        other => parse_move(other),
    }
}

fn number<T: std::str::FromStr>(parts: &[&str], index: usize, command: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = parts
        .get(index)
        .ok_or_else(|| anyhow!("{command}: missing argument"))?;
    raw.parse::<T>()
        .with_context(|| format!("{command}: invalid argument '{raw}'"))
}

/// Parse `level MPS BASE INC`. BASE is minutes or `MIN:SEC`.
fn parse_level(parts: &[&str]) -> Result<XboardCommand> {
    if parts.len() < 2 {
        return Err(anyhow!("Invalid level format"));
    }
    let moves = parts[0]
        .parse()
        .with_context(|| format!("level: invalid moves '{}'", parts[0]))?;

    let (minutes, seconds) = match parts[1].split_once(':') {
        Some((m, s)) => (m, s),
        None => (parts[1], "0"),
    };
    let base_minutes = minutes
        .parse()
        .with_context(|| format!("level: invalid base '{}'", parts[1]))?;
    let base_seconds = seconds
        .parse()
        .with_context(|| format!("level: invalid base '{}'", parts[1]))?;

    // Fractional increments are truncated to whole seconds.
    let increment = match parts.get(2) {
        Some(raw) => raw
            .split('.')
            .next()
            .unwrap_or("0")
            .parse()
            .with_context(|| format!("level: invalid increment '{raw}'"))?,
        None => 0,
    };

    Ok(XboardCommand::Level(LevelParams {
        moves,
        base_minutes,
        base_seconds,
        increment,
    }))
}

fn parse_move(token: &str) -> Result<XboardCommand> {
    if is_coordinate_move(token) {
        Ok(XboardCommand::Move(token.to_ascii_lowercase()))
    } else {
        Err(anyhow!("Unknown command: {token}"))
    }
}
