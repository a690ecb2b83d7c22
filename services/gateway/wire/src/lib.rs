//! Gateway wire protocol: envelopes, opcodes, close codes, intents and outbound framing.
//!
//! Every gateway frame is a JSON object of the shape
//!
//! ```text
//! {"op": <int>, "s": <int|null>, "t": <string|null>, "d": <any>}
//! ```
//!
//! This crate decodes inbound envelopes into [`Frame`], serializes the
//! outbound payloads the client sends (Identify, heartbeats and the other
//! send-direction opcodes), and carries the static protocol tables that
//! callers consult (opcode names, close-code reconnect policy, intent bits).
//!
//! Heartbeats are the hottest outbound message and are formatted into a
//! fixed-capacity [`HeartbeatBuffer`] whose size is validated once at
//! construction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod close;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod identify;
pub mod intents;
pub mod opcode;
pub mod outbound;
pub mod snowflake;

// Re-export main types
pub use close::CloseCode;
pub use endpoint::{Endpoint, Method};
pub use error::WireError;
pub use frame::{Frame, Hello};
pub use heartbeat::{HeartbeatBuffer, HEARTBEAT_CAPACITY, HEARTBEAT_PREFIX, HEARTBEAT_SUFFIX};
pub use identify::{ConnectionProperties, Identify};
pub use intents::Intents;
pub use opcode::OpCode;
pub use outbound::OutboundFrame;
pub use snowflake::{Snowflake, DISCORD_EPOCH_MS};

/// Gateway API version negotiated in the connection URL.
pub const API_VERSION: u8 = 10;

/// Payload encoding negotiated in the connection URL.
pub const ENCODING: &str = "json";
