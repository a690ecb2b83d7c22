//! Gateway opcodes.

use serde::{Deserialize, Serialize};

/// Direction a given opcode travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server only
    Send,
    /// Server to client only
    Receive,
    /// Both directions
    Both,
}

/// Opcodes as defined by the gateway protocol
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OpCode {
    /// An event was dispatched
    Dispatch = 0,
    /// Liveness beat (either side may request one)
    Heartbeat = 1,
    /// Start a new session
    Identify = 2,
    /// Update the client's presence
    PresenceUpdate = 3,
    /// Join, leave or move between voice channels
    VoiceStateUpdate = 4,
    /// Resume a previous session
    Resume = 6,
    /// Server asks the client to reconnect and resume
    Reconnect = 7,
    /// Request members of a guild
    RequestGuildMembers = 8,
    /// The session has been invalidated
    InvalidSession = 9,
    /// First frame after connecting; carries the heartbeat interval
    Hello = 10,
    /// Acknowledges a received heartbeat
    HeartbeatAck = 11,
    /// Request soundboard sounds of guilds
    RequestSoundboardSounds = 31,
}

impl OpCode {
    /// Protocol name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Dispatch => "dispatch",
            OpCode::Heartbeat => "heartbeat",
            OpCode::Identify => "identify",
            OpCode::PresenceUpdate => "presence_update",
            OpCode::VoiceStateUpdate => "voice_state_update",
            OpCode::Resume => "resume",
            OpCode::Reconnect => "reconnect",
            OpCode::RequestGuildMembers => "request_guild_members",
            OpCode::InvalidSession => "invalid_session",
            OpCode::Hello => "hello",
            OpCode::HeartbeatAck => "heartbeat_ack",
            OpCode::RequestSoundboardSounds => "request_soundboard_sounds",
        }
    }

    /// Which side of the connection sends this opcode
    pub fn direction(self) -> Direction {
        match self {
            OpCode::Heartbeat => Direction::Both,
            OpCode::Dispatch
            | OpCode::Reconnect
            | OpCode::InvalidSession
            | OpCode::Hello
            | OpCode::HeartbeatAck => Direction::Receive,
            OpCode::Identify
            | OpCode::PresenceUpdate
            | OpCode::VoiceStateUpdate
            | OpCode::Resume
            | OpCode::RequestGuildMembers
            | OpCode::RequestSoundboardSounds => Direction::Send,
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpCode::Dispatch),
            1 => Ok(OpCode::Heartbeat),
            2 => Ok(OpCode::Identify),
            3 => Ok(OpCode::PresenceUpdate),
            4 => Ok(OpCode::VoiceStateUpdate),
            6 => Ok(OpCode::Resume),
            7 => Ok(OpCode::Reconnect),
            8 => Ok(OpCode::RequestGuildMembers),
            9 => Ok(OpCode::InvalidSession),
            10 => Ok(OpCode::Hello),
            11 => Ok(OpCode::HeartbeatAck),
            31 => Ok(OpCode::RequestSoundboardSounds),
            _ => Err(crate::WireError::OpCode(value)),
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table() {
        assert_eq!(OpCode::try_from(10).unwrap(), OpCode::Hello);
        assert_eq!(OpCode::try_from(31).unwrap(), OpCode::RequestSoundboardSounds);
        assert!(OpCode::try_from(5).is_err());
        assert_eq!(u8::from(OpCode::HeartbeatAck), 11);
        assert_eq!(OpCode::Heartbeat.direction(), Direction::Both);
        assert_eq!(OpCode::Identify.direction(), Direction::Send);
        assert_eq!(OpCode::InvalidSession.to_string(), "invalid_session(9)");
    }
}
