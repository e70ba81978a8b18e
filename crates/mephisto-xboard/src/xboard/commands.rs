//! CECP command definitions

/// GUI commands the bridge understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XboardCommand {
    /// Switch to xboard mode
    Xboard,

    /// Protocol version announcement
    Protover(u32),

    /// Liveness check, answered with `pong`
    Ping(String),

    /// Start a new game from the initial position
    New,

    /// Show thinking output
    Post,

    /// Hide thinking output
    NoPost,

    /// Pondering on / off; both select the infinite level in unlimited mode
    Easy,
    Hard,

    /// Stop playing moves, only accept them
    Force,

    /// Set up a position
    SetBoard(String),

    /// Remaining time on the engine's clock, in centiseconds
    Time(i64),

    /// Remaining time on the opponent's clock, in centiseconds
    Otim(i64),

    /// Fixed seconds per move
    St(u32),

    /// Conventional or incremental clock
    Level(LevelParams),

    /// Enter analysis mode
    Analyze,

    /// Leave analysis mode
    Exit,

    /// Move now
    MoveNow,

    /// Analysis status request
    Status,

    /// Take back one half-move
    Undo,

    /// Take back a full move
    Remove,

    /// Start thinking for the side to move
    Go,

    /// Terminate
    Quit,

    /// A coordinate move such as `e2e4` or `e7e8q`
    Move(String),

    /// Raw device keys (console debugging)
    Keys(String),

    /// Print the device clock (console debugging)
    GetClock,

    /// Set the device clock in Hz (console debugging)
    SetClock(u32),
}

/// Arguments of `level MPS BASE INC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    /// Moves per time control, 0 for sudden death
    pub moves: u32,
    /// Base time, minutes part
    pub base_minutes: u32,
    /// Base time, seconds part (`MIN:SEC` notation)
    pub base_seconds: u32,
    /// Increment in seconds
    pub increment: u32,
}
