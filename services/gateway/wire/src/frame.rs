//! Inbound gateway envelope.
//!
//! Frames are decoded once per transport read and are otherwise treated as
//! opaque: only `op`, `s` and `t` are interpreted by the session, `d` is
//! handed to the user handler untouched.

use crate::opcode::OpCode;
use crate::WireError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Decoded `{op, s, t, d}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Raw opcode; unknown values are kept so callers can still inspect them
    pub op: u32,
    /// Sequence number, present on dispatches
    #[serde(default)]
    pub s: Option<u64>,
    /// Event name, present on dispatches
    #[serde(default)]
    pub t: Option<String>,
    /// Event data
    #[serde(default)]
    pub d: Value,
}

/// Payload of the hello opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Hello {
    /// Interval between heartbeats in milliseconds
    pub heartbeat_interval: u64,
}

impl Hello {
    /// Heartbeat interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

impl Frame {
    /// Decode an envelope from a text payload
    pub fn decode(text: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Known opcode, if any
    pub fn opcode(&self) -> Option<OpCode> {
        u8::try_from(self.op)
            .ok()
            .and_then(|op| OpCode::try_from(op).ok())
    }

    /// Whether this frame carries the given opcode
    pub fn is(&self, op: OpCode) -> bool {
        self.op == u32::from(op as u8)
    }

    /// Sequence number carried by the frame
    pub fn sequence(&self) -> Option<u64> {
        self.s
    }

    /// Event name carried by the frame
    pub fn event_type(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Parse the hello payload
    pub fn hello(&self) -> Result<Hello, WireError> {
        if !self.is(OpCode::Hello) {
            return Err(WireError::Payload {
                op: "hello",
                reason: format!("frame has opcode {}", self.op),
            });
        }

        let hello = Hello::deserialize(&self.d).map_err(|e| WireError::Payload {
            op: "hello",
            reason: e.to_string(),
        })?;

        if hello.heartbeat_interval == 0 {
            return Err(WireError::Payload {
                op: "hello",
                reason: "heartbeat_interval must be positive".to_string(),
            });
        }

        Ok(hello)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dispatch() {
        let frame =
            Frame::decode(r#"{"op":0,"s":42,"t":"MESSAGE_CREATE","d":{"content":"hi"}}"#).unwrap();
        assert_eq!(frame.opcode(), Some(OpCode::Dispatch));
        assert_eq!(frame.sequence(), Some(42));
        assert_eq!(frame.event_type(), Some("MESSAGE_CREATE"));
        assert_eq!(frame.d["content"], "hi");
    }

    #[test]
    fn test_decode_hello() {
        let frame = Frame::decode(r#"{"op":10,"s":null,"t":null,"d":{"heartbeat_interval":45000}}"#)
            .unwrap();
        let hello = frame.hello().unwrap();
        assert_eq!(hello.interval(), Duration::from_millis(45000));
    }

    #[test]
    fn test_missing_fields_default() {
        let frame = Frame::decode(r#"{"op":11}"#).unwrap();
        assert_eq!(frame.opcode(), Some(OpCode::HeartbeatAck));
        assert!(frame.s.is_none());
        assert!(frame.t.is_none());
        assert!(frame.d.is_null());
    }

    #[test]
    fn test_unknown_opcode_is_kept() {
        let frame = Frame::decode(r#"{"op":99,"d":null}"#).unwrap();
        assert_eq!(frame.op, 99);
        assert!(frame.opcode().is_none());
    }

    #[test]
    fn test_opcode_above_byte_range_is_kept() {
        let frame = Frame::decode(r#"{"op":4096,"s":7,"d":{}}"#).unwrap();
        assert_eq!(frame.op, 4096);
        assert!(frame.opcode().is_none());
        assert!(!frame.is(OpCode::Dispatch));
        assert_eq!(frame.sequence(), Some(7));
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(Frame::decode("{not json"), Err(WireError::Envelope(_))));
        assert!(matches!(Frame::decode(r#"{"s":1}"#), Err(WireError::Envelope(_))));
    }

    #[test]
    fn test_hello_requires_interval() {
        let frame = Frame::decode(r#"{"op":10,"d":{}}"#).unwrap();
        assert!(matches!(frame.hello(), Err(WireError::Payload { op: "hello", .. })));

        let frame = Frame::decode(r#"{"op":10,"d":{"heartbeat_interval":0}}"#).unwrap();
        assert!(frame.hello().is_err());
    }
}
