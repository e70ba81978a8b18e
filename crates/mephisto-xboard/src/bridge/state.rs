/// Bridge control state. The loop starts in `DriverStart` and never
/// terminates on its own; `quit` only raises the exit flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// Measuring host speed before accepting input
    DriverStart,
    /// Waiting for a GUI line
    DriverReady,
    /// A GUI line is held and about to be interpreted
    ParseInput,
    /// Pacing the keys of a command into the keypad
    SendCommand,
    /// Confirming a key whose acknowledgement is ambiguous
    SpecialCommands,
    /// The device is thinking
    Searching,
    /// Reading the device's move from the display
    BestMove,
    /// Asking the device which piece it promoted to
    BestMovePromo,
}

impl BridgeState {
    pub fn name(self) -> &'static str {
        match self {
            BridgeState::DriverStart => "DriverStart",
            BridgeState::DriverReady => "DriverReady",
            BridgeState::ParseInput => "ParseInput",
            BridgeState::SendCommand => "SendCommand",
            BridgeState::SpecialCommands => "SpecialCommands",
            BridgeState::Searching => "Searching",
            BridgeState::BestMove => "BestMove",
            BridgeState::BestMovePromo => "BestMovePromo",
        }
    }

    /// Keys are being entered on the device's behalf.
    pub fn is_keying(self) -> bool {
        matches!(
            self,
            BridgeState::SendCommand | BridgeState::SpecialCommands | BridgeState::BestMovePromo
        )
    }

    /// Idle and able to take the next GUI line.
    pub fn accepts_input(self) -> bool {
        matches!(self, BridgeState::DriverReady)
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(BridgeState::DriverReady.accepts_input());
        assert!(!BridgeState::Searching.accepts_input());
        assert!(BridgeState::BestMovePromo.is_keying());
        assert!(!BridgeState::BestMove.is_keying());
        assert_eq!(BridgeState::SpecialCommands.to_string(), "SpecialCommands");
    }
}
