// Single-byte commands the firmware picks out of the serial stream before line buffering.
// See the realtime command table of the Grbl 1.1 interface document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RealtimeCommand {
    Reset = 0x18,
    StatusReport = b'?',
    CycleStart = b'~',
    FeedHold = b'!',
    SafetyDoor = 0x84,
    JogCancel = 0x85,
    FeedOverrideReset = 0x90,
    FeedOverridePlusTen = 0x91,
    FeedOverrideMinusTen = 0x92,
    FeedOverridePlusOne = 0x93,
    FeedOverrideMinusOne = 0x94,
    RapidOverrideReset = 0x95,
    RapidOverrideHalf = 0x96,
    RapidOverrideQuarter = 0x97,
    SpindleOverrideReset = 0x99,
    SpindleOverridePlusTen = 0x9A,
    SpindleOverrideMinusTen = 0x9B,
    SpindleOverridePlusOne = 0x9C,
    SpindleOverrideMinusOne = 0x9D,
    ToggleSpindleStop = 0x9E, //Only in HOLD state
    ToggleFloodCoolant = 0xA0,
    ToggleMistCoolant = 0xA1,
}

impl RealtimeCommand {
    pub fn from_byte(byte: u8) -> Option<RealtimeCommand> {
        use RealtimeCommand::*;
        Some(match byte {
            0x18 => Reset,
            b'?' => StatusReport,
            b'~' => CycleStart,
            b'!' => FeedHold,
            0x84 => SafetyDoor,
            0x85 => JogCancel,
            0x90 => FeedOverrideReset,
            0x91 => FeedOverridePlusTen,
            0x92 => FeedOverrideMinusTen,
            0x93 => FeedOverridePlusOne,
            0x94 => FeedOverrideMinusOne,
            0x95 => RapidOverrideReset,
            0x96 => RapidOverrideHalf,
            0x97 => RapidOverrideQuarter,
            0x99 => SpindleOverrideReset,
            0x9A => SpindleOverridePlusTen,
            0x9B => SpindleOverrideMinusTen,
            0x9C => SpindleOverridePlusOne,
            0x9D => SpindleOverrideMinusOne,
            0x9E => ToggleSpindleStop,
            0xA0 => ToggleFloodCoolant,
            0xA1 => ToggleMistCoolant,
            _ => return None,
        })
    }
    /// A command is realtime only when it is exactly one recognised byte.
    pub fn from_command(command: &[u8]) -> Option<RealtimeCommand> {
        match command {
            [byte] => RealtimeCommand::from_byte(*byte),
            _ => None,
        }
    }
    pub fn byte(self) -> u8 {
        self as u8
    }
}

pub fn is_realtime_command(command: &[u8]) -> bool {
    RealtimeCommand::from_command(command).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_status_and_jog_cancel() {
        assert_eq!(RealtimeCommand::from_command(b"?"), Some(RealtimeCommand::StatusReport));
        assert_eq!(RealtimeCommand::from_command(&[0x85]), Some(RealtimeCommand::JogCancel));
    }

    #[test]
    fn byte_round_trips_through_discriminant() {
        for byte in 0..=u8::MAX {
            if let Some(command) = RealtimeCommand::from_byte(byte) {
                assert_eq!(command.byte(), byte);
            }
        }
    }

    #[test]
    fn lines_are_never_realtime() {
        assert!(!is_realtime_command(b"?\n"));
        assert!(!is_realtime_command(b"G"));
        assert!(!is_realtime_command(b""));
        assert!(!is_realtime_command(&[0x98]));
    }
}
