//! Heartbeat framing into a fixed-capacity scratch buffer.
//!
//! A heartbeat is `{"op":1,"d":<sequence|null>}`. The buffer is sized once
//! from the widest sequence value it must hold (or the `null` literal, if
//! wider) and is reused for every beat, so sending a heartbeat never
//! allocates.

use crate::WireError;
use std::io::Write;

/// Literal text preceding the sequence value
pub const HEARTBEAT_PREFIX: &str = "{\"op\":1,\"d\":";

/// Literal text following the sequence value
pub const HEARTBEAT_SUFFIX: &str = "}";

const NULL_LITERAL: &str = "null";

/// Number of decimal digits needed to print `value`
pub const fn decimal_width(mut value: u64) -> usize {
    let mut width = 1;
    while value >= 10 {
        value /= 10;
        width += 1;
    }
    width
}

const fn max_usize(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Bytes needed to format a heartbeat whose sequence never exceeds `max_value`
pub const fn required_capacity(max_value: u64) -> usize {
    HEARTBEAT_PREFIX.len()
        + max_usize(decimal_width(max_value), NULL_LITERAL.len())
        + HEARTBEAT_SUFFIX.len()
}

/// Capacity that fits any `u64` sequence
pub const HEARTBEAT_CAPACITY: usize = required_capacity(u64::MAX);

/// Reusable heartbeat formatting buffer
#[derive(Debug, Clone)]
pub struct HeartbeatBuffer {
    buf: Box<[u8]>,
    len: usize,
    max_value: u64,
}

impl HeartbeatBuffer {
    /// Buffer able to hold any `u64` sequence
    pub fn new() -> Self {
        Self {
            buf: vec![0; HEARTBEAT_CAPACITY].into_boxed_slice(),
            len: 0,
            max_value: u64::MAX,
        }
    }

    /// Buffer of `capacity` bytes for sequences up to `max_value`.
    ///
    /// Fails if the capacity cannot hold the widest sequence or the `null`
    /// literal used before the first sequence is known.
    pub fn with_capacity(capacity: usize, max_value: u64) -> Result<Self, WireError> {
        let required = required_capacity(max_value);
        if capacity < required {
            return Err(WireError::Capacity { capacity, required });
        }

        Ok(Self {
            buf: vec![0; capacity].into_boxed_slice(),
            len: 0,
            max_value,
        })
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Largest sequence this buffer was sized for
    pub fn max_value(&self) -> u64 {
        self.max_value
    }

    /// Format a heartbeat for `sequence`, replacing any previous contents
    pub fn format(&mut self, sequence: Option<u64>) -> Result<&str, WireError> {
        if let Some(value) = sequence {
            if value > self.max_value {
                return Err(WireError::Capacity {
                    capacity: self.buf.len(),
                    required: required_capacity(value),
                });
            }
        }

        let capacity = self.buf.len();
        let mut cursor = std::io::Cursor::new(&mut self.buf[..]);
        let written = match sequence {
            Some(value) => write!(cursor, "{HEARTBEAT_PREFIX}{value}{HEARTBEAT_SUFFIX}"),
            None => write!(cursor, "{HEARTBEAT_PREFIX}{NULL_LITERAL}{HEARTBEAT_SUFFIX}"),
        };
        written.map_err(|_| WireError::Capacity {
            capacity,
            required: required_capacity(sequence.unwrap_or(0)),
        })?;
        self.len = cursor.position() as usize;

        self.as_str()
    }

    /// Most recently formatted heartbeat
    pub fn as_str(&self) -> Result<&str, WireError> {
        std::str::from_utf8(&self.buf[..self.len]).map_err(|e| WireError::Payload {
            op: "heartbeat",
            reason: e.to_string(),
        })
    }
}

impl Default for HeartbeatBuffer {
    fn default() -> Self {
        Self::new()
    }
}
