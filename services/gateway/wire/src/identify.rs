//! Identify payload sent once at session start.

use crate::intents::Intents;
use crate::opcode::OpCode;
use crate::WireError;
use serde::Serialize;
use std::fmt;

/// Client properties reported at Identify time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProperties {
    /// Operating system
    pub os: String,
    /// Library name
    pub browser: String,
    /// Library name
    pub device: String,
}

impl ConnectionProperties {
    /// Properties for `library` running on the current OS
    pub fn for_library(library: impl Into<String>) -> Self {
        let library = library.into();
        Self {
            os: std::env::consts::OS.to_string(),
            browser: library.clone(),
            device: library,
        }
    }
}

/// Credentials and subscription sent with the identify opcode
#[derive(Clone)]
pub struct Identify {
    token: String,
    intents: Intents,
    properties: ConnectionProperties,
}

impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .finish()
    }
}

#[derive(Serialize)]
struct IdentifyData<'a> {
    token: &'a str,
    intents: u32,
    properties: &'a ConnectionProperties,
}

#[derive(Serialize)]
struct IdentifyEnvelope<'a> {
    op: u8,
    d: IdentifyData<'a>,
}

impl Identify {
    /// Create an Identify payload
    pub fn new(token: impl Into<String>, intents: Intents, properties: ConnectionProperties) -> Self {
        Self {
            token: token.into(),
            intents,
            properties,
        }
    }

    /// Subscribed intents
    pub fn intents(&self) -> Intents {
        self.intents
    }

    /// Reported client properties
    pub fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    /// Serialize to the outbound `{op: 2, d: {...}}` text frame
    pub fn to_json(&self) -> Result<String, WireError> {
        let envelope = IdentifyEnvelope {
            op: OpCode::Identify.into(),
            d: IdentifyData {
                token: &self.token,
                intents: self.intents.bits(),
                properties: &self.properties,
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_identify_shape() {
        let identify = Identify::new(
            "secret",
            Intents::GUILDS | Intents::GUILD_MESSAGES,
            ConnectionProperties {
                os: "linux".to_string(),
                browser: "redb-gateway".to_string(),
                device: "redb-gateway".to_string(),
            },
        );

        let value: Value = serde_json::from_str(&identify.to_json().unwrap()).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "secret");
        assert_eq!(value["d"]["intents"], 513);
        assert_eq!(value["d"]["properties"]["os"], "linux");
        assert_eq!(value["d"]["properties"]["browser"], "redb-gateway");
        assert_eq!(value["d"]["properties"]["device"], "redb-gateway");
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let identify = Identify::new("secret", Intents::GUILDS, ConnectionProperties::for_library("x"));
        assert!(!format!("{:?}", identify).contains("secret"));
        assert_eq!(identify.properties().device, "x");
        assert_eq!(identify.intents(), Intents::GUILDS);
    }
}
