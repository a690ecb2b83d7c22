//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Envelope is not valid JSON or does not have the `{op, s, t, d}` shape
    #[error("envelope decode failed: {0}")]
    Envelope(#[from] serde_json::Error),

    /// Payload of a known opcode is missing a required field
    #[error("malformed {op} payload: {reason}")]
    Payload {
        /// Opcode name
        op: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Formatting buffer too small for the widest value it must hold
    #[error("buffer capacity {capacity} below required {required}")]
    Capacity {
        /// Requested capacity
        capacity: usize,
        /// Minimum capacity
        required: usize,
    },

    /// Unknown opcode
    #[error("unknown opcode {0}")]
    OpCode(u8),

    /// Unknown intent name
    #[error("unknown intent {0:?}")]
    Intent(String),

    /// Unknown HTTP method in an endpoint specifier
    #[error("unknown method {0:?}")]
    Method(String),

    /// Endpoint specifier is not `METHOD /path`
    #[error("malformed endpoint {0:?}")]
    Endpoint(String),

    /// Identifier is not a decimal snowflake
    #[error("invalid snowflake {0:?}")]
    Snowflake(String),
}
