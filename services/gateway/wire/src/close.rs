//! Gateway close codes and their reconnect policy.
//!
//! The session never acts on this table by itself; it reports the code it
//! observed and callers decide whether to connect again.

/// Close codes the gateway (or the client) may use to end a connection
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Normal closure; the client appears offline immediately
    Normal = 1000,
    /// Endpoint going away; same effect as `Normal` on the presence
    GoingAway = 1001,
    /// Unknown error on the server side
    UnknownError = 4000,
    /// An invalid opcode or payload for an opcode was sent
    UnknownOpcode = 4001,
    /// An invalid payload was sent
    DecodeError = 4002,
    /// A payload was sent before identifying
    NotAuthenticated = 4003,
    /// The token sent with Identify is invalid
    AuthenticationFailed = 4004,
    /// More than one Identify was sent
    AlreadyAuthenticated = 4005,
    /// Session is no longer valid
    SessionNoLongerValid = 4006,
    /// Invalid sequence sent when resuming
    InvalidSeq = 4007,
    /// Payloads are being sent too quickly
    RateLimited = 4008,
    /// The session timed out
    SessionTimedOut = 4009,
    /// Invalid shard sent when identifying
    InvalidShard = 4010,
    /// The session would have handled too many guilds
    ShardingRequired = 4011,
    /// Invalid gateway version
    InvalidApiVersion = 4012,
    /// Invalid intent bits
    InvalidIntents = 4013,
    /// Intents the application is not approved for
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Look up a numeric close code
    pub fn from_u16(code: u16) -> Option<Self> {
        let code = match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            4000 => CloseCode::UnknownError,
            4001 => CloseCode::UnknownOpcode,
            4002 => CloseCode::DecodeError,
            4003 => CloseCode::NotAuthenticated,
            4004 => CloseCode::AuthenticationFailed,
            4005 => CloseCode::AlreadyAuthenticated,
            4006 => CloseCode::SessionNoLongerValid,
            4007 => CloseCode::InvalidSeq,
            4008 => CloseCode::RateLimited,
            4009 => CloseCode::SessionTimedOut,
            4010 => CloseCode::InvalidShard,
            4011 => CloseCode::ShardingRequired,
            4012 => CloseCode::InvalidApiVersion,
            4013 => CloseCode::InvalidIntents,
            4014 => CloseCode::DisallowedIntents,
            _ => return None,
        };
        Some(code)
    }

    /// Numeric value
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether a fresh connection has a chance of succeeding after this close
    pub fn should_reconnect(self) -> bool {
        !matches!(
            self,
            CloseCode::AuthenticationFailed
                | CloseCode::InvalidShard
                | CloseCode::ShardingRequired
                | CloseCode::InvalidApiVersion
                | CloseCode::InvalidIntents
                | CloseCode::DisallowedIntents
        )
    }

    /// Short protocol name
    pub fn describe(self) -> &'static str {
        match self {
            CloseCode::Normal => "normal",
            CloseCode::GoingAway => "going_away",
            CloseCode::UnknownError => "unknown_error",
            CloseCode::UnknownOpcode => "unknown_opcode",
            CloseCode::DecodeError => "decode_error",
            CloseCode::NotAuthenticated => "not_authenticated",
            CloseCode::AuthenticationFailed => "authentication_failed",
            CloseCode::AlreadyAuthenticated => "already_authenticated",
            CloseCode::SessionNoLongerValid => "session_no_longer_valid",
            CloseCode::InvalidSeq => "invalid_seq",
            CloseCode::RateLimited => "rate_limited",
            CloseCode::SessionTimedOut => "session_timed_out",
            CloseCode::InvalidShard => "invalid_shard",
            CloseCode::ShardingRequired => "sharding_required",
            CloseCode::InvalidApiVersion => "invalid_api_version",
            CloseCode::InvalidIntents => "invalid_intents",
            CloseCode::DisallowedIntents => "disallowed_intents",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.describe())
    }
}
