//! Snowflake identifiers and their embedded timestamps.

use crate::WireError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Milliseconds since the Unix epoch at which snowflake time starts
pub const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// A 64-bit identifier whose upper 42 bits are a millisecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Milliseconds since the Unix epoch at which the identifier was minted
    pub fn timestamp_ms(self) -> u64 {
        (self.0 >> 22) + DISCORD_EPOCH_MS
    }

    /// Creation time
    pub fn timestamp(self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.timestamp_ms()).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl FromStr for Snowflake {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| WireError::Snowflake(s.to_string()))
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Identifiers exceed the 53-bit integer range of JSON consumers, so they travel as strings
impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
