//! Positions and the "set position" key dialogue.
//!
//! The devices take a position as a list of squares per piece type, entered
//! in POS mode. [`setboard_keys`] builds that dialogue from a FEN string
//! and [`replay_setboard`] reads one back, which is how the bridge keeps
//! its own copy of the device board.

use crate::error::FenError;
use crate::profile::CommandTemplates;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Longest line accepted from a position file.
pub const MAX_FEN_LINE: usize = 2000;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

/// Entry order of the position dialogue.
const BUCKETS: [Piece; 12] = {
    use Color::*;
    use PieceKind::*;
    [
        Piece { color: White, kind: King },
        Piece { color: White, kind: Queen },
        Piece { color: White, kind: Rook },
        Piece { color: White, kind: Bishop },
        Piece { color: White, kind: Knight },
        Piece { color: White, kind: Pawn },
        Piece { color: Black, kind: King },
        Piece { color: Black, kind: Queen },
        Piece { color: Black, kind: Rook },
        Piece { color: Black, kind: Bishop },
        Piece { color: Black, kind: Knight },
        Piece { color: Black, kind: Pawn },
    ]
};

/// Most squares the device accepts for one piece type.
const BUCKET_CAPACITY: usize = 8;

impl Piece {
    pub fn from_fen_char(c: char) -> Option<Self> {
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        let kind = match c.to_ascii_lowercase() {
            'k' => PieceKind::King,
            'q' => PieceKind::Queen,
            'r' => PieceKind::Rook,
            'b' => PieceKind::Bishop,
            'n' => PieceKind::Knight,
            'p' => PieceKind::Pawn,
            _ => return None,
        };
        Some(Self { color, kind })
    }

    pub fn to_fen_char(self) -> char {
        let c = match self.kind {
            PieceKind::King => 'k',
            PieceKind::Queen => 'q',
            PieceKind::Rook => 'r',
            PieceKind::Bishop => 'b',
            PieceKind::Knight => 'n',
            PieceKind::Pawn => 'p',
        };
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}

/// Square name for a scan index (a8 = 0, h1 = 63).
pub fn square_name(index: usize) -> String {
    let file = (b'a' + (index % 8) as u8) as char;
    let rank = (b'8' - (index / 8) as u8) as char;
    format!("{file}{rank}")
}

fn square_index(file: char, rank: char) -> Option<usize> {
    if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
        return None;
    }
    let f = file as usize - 'a' as usize;
    let r = '8' as usize - rank as usize;
    Some(r * 8 + f)
}

/// Piece placement in scan order.
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Option<Piece>; 64],
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    pub fn empty() -> Self {
        Self { squares: [None; 64] }
    }

    pub fn starting() -> Self {
        let mut board = Self::empty();
        let back = "rnbqkbnr";
        for (file, c) in back.chars().enumerate() {
            board.squares[file] = Piece::from_fen_char(c);
            board.squares[56 + file] = Piece::from_fen_char(c.to_ascii_uppercase());
            board.squares[8 + file] = Piece::from_fen_char('p');
            board.squares[48 + file] = Piece::from_fen_char('P');
        }
        board
    }

    /// Reed-switch image: bit `i` set when scan index `i` is occupied.
    pub fn occupancy(&self) -> u64 {
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, sq)| sq.is_some())
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i))
    }

    /// Squares holding `piece`, in scan order.
    fn squares_of(&self, piece: Piece) -> impl Iterator<Item = usize> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter(move |(_, sq)| **sq == Some(piece))
            .map(|(i, _)| i)
    }

    /// The FEN placement field.
    pub fn placement(&self) -> String {
        let mut out = String::new();
        for rank in 0..8 {
            let mut empty = 0;
            for file in 0..8 {
                match self.squares[rank * 8 + file] {
                    Some(piece) => {
                        if empty > 0 {
                            out.push_str(&empty.to_string());
                            empty = 0;
                        }
                        out.push(piece.to_fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push_str(&empty.to_string());
            }
            if rank < 7 {
                out.push('/');
            }
        }
        out
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.placement())
    }
}

/// The two FEN fields the device can represent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub board: Board,
    pub side_to_move: Color,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            board: Board::starting(),
            side_to_move: Color::White,
        }
    }
}

/// Parse a FEN string. Castling, en passant and the move counters are
/// validated when present and then dropped.
pub fn parse_fen(fen: &str) -> Result<Position, FenError> {
    let mut fields = fen.split_whitespace();
    let placement = fields.next().ok_or(FenError::Empty)?;

    let mut board = Board::empty();
    let mut index = 0usize;
    for c in placement.chars() {
        match c {
            '/' => {}
            '1'..='8' => index += c as usize - '0' as usize,
            _ => {
                let piece = Piece::from_fen_char(c).ok_or(FenError::InvalidPiece(c))?;
                if index < 64 {
                    board.squares[index] = Some(piece);
                }
                index += 1;
            }
        }
    }
    if index != 64 {
        return Err(FenError::SquareCount(index));
    }

    let side_to_move = match fields.next() {
        None | Some("w") => Color::White,
        Some("b") => Color::Black,
        Some(other) => return Err(FenError::InvalidSide(other.to_string())),
    };

    if let Some(castling) = fields.next() {
        if castling != "-" && !castling.chars().all(|c| "KQkq".contains(c)) {
            return Err(invalid("castling", castling));
        }
    }
    if let Some(ep) = fields.next() {
        let mut chars = ep.chars();
        let valid = ep == "-"
            || (ep.len() == 2
                && matches!(chars.next(), Some('a'..='h'))
                && matches!(chars.next(), Some('3' | '6')));
        if !valid {
            return Err(invalid("en passant", ep));
        }
    }
    for field in ["halfmove clock", "fullmove number"] {
        if let Some(value) = fields.next() {
            value.parse::<u32>().map_err(|_| invalid(field, value))?;
        }
    }

    Ok(Position { board, side_to_move })
}

fn invalid(field: &'static str, value: &str) -> FenError {
    FenError::InvalidField {
        field,
        value: value.to_string(),
    }
}

/// Key dialogue that sets up `position` on the device.
///
/// In force mode the dialogue first leaves force mode (CL) and re-enters
/// it (MEM) at the end.
pub fn setboard_keys(
    position: &Position,
    templates: &CommandTemplates,
    force: bool,
) -> Result<String, FenError> {
    let mut keys = String::new();
    if force {
        keys.push('r');
    }
    keys.push_str(templates.setboard);

    for piece in BUCKETS {
        let squares: Vec<usize> = position.board.squares_of(piece).collect();
        let capacity = if piece.kind == PieceKind::King { 1 } else { BUCKET_CAPACITY };
        if squares.len() > capacity {
            return Err(invalid("placement", &position.board.placement()));
        }
        for sq in squares {
            keys.push_str(&square_name(sq));
            keys.push('s');
        }
        if piece.kind != PieceKind::King {
            keys.push('s');
        }
    }

    keys.push_str(match position.side_to_move {
        Color::White => "0s",
        Color::Black => "9s",
    });
    keys.push('r');
    if force {
        keys.push('m');
    }
    Ok(keys)
}

/// Read a position dialogue back into the position it enters.
pub fn replay_setboard(keys: &str, templates: &CommandTemplates) -> Result<Position, FenError> {
    let malformed = || invalid("setboard keys", keys);

    let rest = keys.strip_prefix('r').filter(|r| r.starts_with(templates.setboard));
    let rest = rest.unwrap_or(keys);
    let mut chars: Vec<char> = rest
        .strip_prefix(templates.setboard)
        .ok_or_else(malformed)?
        .chars()
        .collect();
    chars.reverse();

    let mut board = Board::empty();
    for piece in BUCKETS {
        loop {
            match chars.last() {
                Some('a'..='h') => {
                    let file = chars.pop().ok_or_else(malformed)?;
                    let rank = chars.pop().ok_or_else(malformed)?;
                    let index = square_index(file, rank).ok_or_else(malformed)?;
                    if chars.pop() != Some('s') {
                        return Err(malformed());
                    }
                    board.squares[index] = Some(piece);
                    if piece.kind == PieceKind::King {
                        break;
                    }
                }
                Some('s') if piece.kind != PieceKind::King => {
                    chars.pop();
                    break;
                }
                _ if piece.kind == PieceKind::King => break,
                _ => return Err(malformed()),
            }
        }
    }

    let side_to_move = match (chars.pop(), chars.pop()) {
        (Some('0'), Some('s')) => Color::White,
        (Some('9'), Some('s')) => Color::Black,
        _ => return Err(malformed()),
    };
    if chars.pop() != Some('r') {
        return Err(malformed());
    }
    Ok(Position { board, side_to_move })
}

/// Read the first line of a position file.
pub fn load_fen_file(path: &Path) -> Result<Position, FenError> {
    let file = std::fs::File::open(path).map_err(|e| FenError::Io(e.to_string()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| FenError::Io(e.to_string()))?;
    let line: String = line.trim().chars().take(MAX_FEN_LINE).collect();
    parse_fen(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::DeviceProfile;
    use std::io::Write;

    fn mm_templates() -> CommandTemplates {
        DeviceProfile::lookup("mm50", true).unwrap().templates
    }

    #[test]
    fn test_start_position_parses() {
        let position = parse_fen(START_FEN).unwrap();
        assert_eq!(position.board, Board::starting());
        assert_eq!(position.side_to_move, Color::White);
        assert_eq!(position.board.placement(), "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR");
        assert_eq!(position.board.occupancy(), 0xFFFF_0000_0000_FFFF);
    }

    #[test]
    fn test_wrong_square_count_is_rejected() {
        assert_eq!(
            parse_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBN w"),
            Err(FenError::SquareCount(63))
        );
        assert_eq!(parse_fen(""), Err(FenError::Empty));
        assert_eq!(parse_fen("8/8/8/8/8/8/8/7x w"), Err(FenError::InvalidPiece('x')));
    }

    #[test]
    fn test_trailing_fields_are_validated() {
        assert!(parse_fen("4k3/8/8/8/8/8/8/4K3 b - e3 12 40").is_ok());
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 x"),
            Err(FenError::InvalidSide(_))
        ));
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 w KX"),
            Err(FenError::InvalidField { field: "castling", .. })
        ));
        assert!(matches!(
            parse_fen("4k3/8/8/8/8/8/8/4K3 w - - x"),
            Err(FenError::InvalidField { field: "halfmove clock", .. })
        ));
    }

    #[test]
    fn test_kings_only_dialogue() {
        let position = parse_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        let keys = setboard_keys(&position, &mm_templates(), false).unwrap();
        // WK, five empty white buckets, BK, five empty black buckets.
        assert_eq!(keys, concat!("pss", "e1s", "sssss", "e8s", "sssss", "9s", "r"));
    }

    #[test]
    fn test_force_mode_wraps_dialogue() {
        let position = parse_fen("4k3/8/8/8/8/8/8/4K3 w").unwrap();
        let keys = setboard_keys(&position, &mm_templates(), true).unwrap();
        assert!(keys.starts_with("rpss"));
        assert!(keys.ends_with("0srm"));
    }

    #[test]
    fn test_start_position_replays_to_start_board() {
        let templates = mm_templates();
        let start = parse_fen(START_FEN).unwrap();
        for force in [false, true] {
            let keys = setboard_keys(&start, &templates, force).unwrap();
            let replayed = replay_setboard(&keys, &templates).unwrap();
            assert_eq!(replayed.board, Board::starting());
            assert_eq!(replayed.side_to_move, Color::White);
        }
    }

    #[test]
    fn test_replay_rejects_truncated_dialogue() {
        let templates = mm_templates();
        assert!(replay_setboard("psse1s", &templates).is_err());
        assert!(replay_setboard("l1s", &templates).is_err());
    }

    #[test]
    fn test_two_white_kings_are_rejected() {
        let position = parse_fen("4k3/8/8/8/8/8/8/3KK3 w").unwrap();
        assert!(setboard_keys(&position, &mm_templates(), false).is_err());
    }

    #[test]
    fn test_position_file_reads_first_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        writeln!(file, "garbage").unwrap();
        let position = load_fen_file(file.path()).unwrap();
        assert_eq!(position.side_to_move, Color::Black);
        assert!(load_fen_file(Path::new("/nonexistent/fen.txt")).is_err());
    }
}
