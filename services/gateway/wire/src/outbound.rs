//! Builders for the send-direction opcodes other than Identify and heartbeat.

use crate::opcode::{Direction, OpCode};
use crate::snowflake::Snowflake;
use crate::WireError;
use serde::Serialize;
use serde_json::{json, Value};

/// A client-to-server `{op, d}` frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// Opcode
    pub op: OpCode,
    /// Payload
    pub d: Value,
}

impl OutboundFrame {
    /// Wrap a payload; receive-only opcodes are rejected
    pub fn new(op: OpCode, d: Value) -> Result<Self, WireError> {
        if op.direction() == Direction::Receive {
            return Err(WireError::OpCode(op.into()));
        }
        Ok(Self { op, d })
    }

    /// Update the client's presence
    pub fn presence_update(status: &str, afk: bool, since: Option<u64>, activities: Vec<Value>) -> Self {
        Self {
            op: OpCode::PresenceUpdate,
            d: json!({
                "since": since,
                "activities": activities,
                "status": status,
                "afk": afk,
            }),
        }
    }

    /// Join, move or leave (`channel_id: None`) a voice channel
    pub fn voice_state_update(
        guild_id: Snowflake,
        channel_id: Option<Snowflake>,
        self_mute: bool,
        self_deaf: bool,
    ) -> Self {
        Self {
            op: OpCode::VoiceStateUpdate,
            d: json!({
                "guild_id": guild_id,
                "channel_id": channel_id,
                "self_mute": self_mute,
                "self_deaf": self_deaf,
            }),
        }
    }

    /// Request members whose username starts with `query` (empty for all)
    pub fn request_guild_members(guild_id: Snowflake, query: &str, limit: u32) -> Self {
        Self {
            op: OpCode::RequestGuildMembers,
            d: json!({
                "guild_id": guild_id,
                "query": query,
                "limit": limit,
            }),
        }
    }

    /// Request the soundboard sounds of the given guilds
    pub fn request_soundboard_sounds(guild_ids: &[Snowflake]) -> Self {
        Self {
            op: OpCode::RequestSoundboardSounds,
            d: json!({ "guild_ids": guild_ids }),
        }
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}
