//! Configuration handling for the gateway client.
//!
//! Settings come from a YAML file, then environment variables, then the
//! command line; each layer overrides the one before it.

use anyhow::{bail, Context, Result};
use gateway_session::ConnectOptions;
use gateway_wire::{ConnectionProperties, Identify, Intents, WireError, API_VERSION, ENCODING};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Intents as written in the config: a list of names or the raw bitmask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntentsSetting {
    /// Raw bitmask
    Bits(u32),
    /// Intent names such as `GUILDS` or `message_content`
    Names(Vec<String>),
}

impl IntentsSetting {
    /// Parse `GUILDS,GUILD_MESSAGES` or `513`
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<u32>() {
            Ok(bits) => IntentsSetting::Bits(bits),
            Err(_) => IntentsSetting::Names(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    /// Resolve to intent flags
    pub fn resolve(&self) -> Result<Intents> {
        match self {
            IntentsSetting::Bits(bits) => Intents::from_bits(*bits).ok_or_else(|| {
                WireError::Intent(format!("unknown bits {:#x}", bits & !Intents::all().bits()))
                    .into()
            }),
            IntentsSetting::Names(names) => Ok(Intents::from_names(names)?),
        }
    }
}

impl Default for IntentsSetting {
    fn default() -> Self {
        IntentsSetting::Bits(Intents::default().bits())
    }
}

/// Client properties reported with Identify
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertiesConfig {
    /// Operating system
    pub os: String,
    /// Library name
    pub browser: String,
    /// Device name
    pub device: String,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        let defaults = ConnectionProperties::for_library(env!("CARGO_PKG_NAME"));
        Self {
            os: defaults.os,
            browser: defaults.browser,
            device: defaults.device,
        }
    }
}

/// Gateway client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bot token sent with Identify
    pub token: String,
    /// Event categories to subscribe to
    pub intents: IntentsSetting,
    /// Gateway host
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// Whether to connect with TLS
    pub tls: bool,
    /// Gateway API version
    pub api_version: u8,
    /// Payload encoding
    pub encoding: String,
    /// WebSocket upgrade timeout, e.g. `10s`
    pub handshake_timeout: String,
    /// Identify properties
    pub properties: PropertiesConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            intents: IntentsSetting::default(),
            host: "gateway.discord.gg".to_string(),
            port: 443,
            tls: true,
            api_version: API_VERSION,
            encoding: ENCODING.to_string(),
            handshake_timeout: "10s".to_string(),
            properties: PropertiesConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<GatewayConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {:?}, using defaults: {}",
                        config_path.as_ref(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", config_path.as_ref());
                Self::default()
            }
        };

        config.apply_environment_overrides(|key| std::env::var(key).ok());

        info!(
            "Final gateway configuration: host={}, port={}, tls={}, api_version={}",
            config.host, config.port, config.tls, config.api_version
        );
        Ok(config)
    }

    /// Apply `GATEWAY_*` overrides read through `lookup`
    pub fn apply_environment_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("GATEWAY_TOKEN") {
            self.token = token;
            info!("Token overridden by environment");
        }

        if let Some(intents) = lookup("GATEWAY_INTENTS") {
            self.intents = IntentsSetting::parse(&intents);
            info!("Intents overridden by environment: {:?}", self.intents);
        }

        if let Some(host) = lookup("GATEWAY_HOST") {
            self.host = host;
            info!("Host overridden by environment: {}", self.host);
        }

        if let Some(port) = lookup("GATEWAY_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    self.port = port;
                    info!("Port overridden by environment: {}", port);
                }
                Err(_) => warn!("Ignoring invalid GATEWAY_PORT {:?}", port),
            }
        }

        if let Some(tls) = lookup("GATEWAY_TLS") {
            self.tls = matches!(tls.to_lowercase().as_str(), "true" | "1" | "yes");
            info!("TLS overridden by environment: {}", self.tls);
        }
    }

    /// Parsed handshake timeout
    pub fn handshake_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.handshake_timeout)
            .with_context(|| format!("invalid handshake_timeout {:?}", self.handshake_timeout))
    }

    /// Connection options for the transport
    pub fn connect_options(&self) -> Result<ConnectOptions> {
        Ok(ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            tls: self.tls,
            path: ConnectOptions::gateway_path(self.api_version, &self.encoding),
            headers: vec![(
                "User-Agent".to_string(),
                format!("{} ({})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            )],
            handshake_timeout: self.handshake_timeout()?,
        })
    }

    /// Identify payload built from the token, intents and properties
    pub fn identify(&self) -> Result<Identify> {
        if self.token.is_empty() {
            bail!("no token configured; set `token`, GATEWAY_TOKEN or --token");
        }
        if self.encoding != ENCODING {
            bail!("unsupported encoding {:?}; only {:?} is implemented", self.encoding, ENCODING);
        }
        let properties = ConnectionProperties {
            os: self.properties.os.clone(),
            browser: self.properties.browser.clone(),
            device: self.properties.device.clone(),
        };
        Ok(Identify::new(self.token.clone(), self.intents.resolve()?, properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_from(yaml: &str) -> GatewayConfig {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();
        GatewayConfig::load_from_file(temp_file.path()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.host, "gateway.discord.gg");
        assert_eq!(config.port, 443);
        assert!(config.tls);
        assert_eq!(config.api_version, 10);
        assert_eq!(config.handshake_timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.intents.resolve().unwrap(), Intents::default());
    }

    #[test]
    fn test_load_from_file() {
        let config = config_from(
            r#"
token: abc123
intents:
  - guilds
  - GUILD_MESSAGES
  - message_content
host: gateway.example.test
port: 8443
handshake_timeout: 2500ms
properties:
  os: linux
  browser: redb
"#,
        );

        assert_eq!(config.token, "abc123");
        assert_eq!(config.host, "gateway.example.test");
        assert_eq!(config.port, 8443);
        assert!(config.tls);
        assert_eq!(config.handshake_timeout().unwrap(), Duration::from_millis(2500));
        assert_eq!(
            config.intents.resolve().unwrap(),
            Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT
        );
        assert_eq!(config.properties.os, "linux");
        assert_eq!(config.properties.browser, "redb");
        assert_eq!(config.properties.device, env!("CARGO_PKG_NAME"));

        let options = config.connect_options().unwrap();
        assert_eq!(options.url(), "wss://gateway.example.test:8443/?v=10&encoding=json");
    }

    #[test]
    fn test_raw_intent_bits() {
        let config = config_from("token: t\nintents: 33281\n");
        assert_eq!(config.intents, IntentsSetting::Bits(33281));
        assert!(config
            .intents
            .resolve()
            .unwrap()
            .contains(Intents::MESSAGE_CONTENT));
    }

    #[test]
    fn test_unknown_intent_bits_rejected() {
        // bit 17 is not a defined intent
        let config = config_from("token: t\nintents: 131073\n");
        let err = config.intents.resolve().unwrap_err();
        assert!(err.to_string().contains("0x20000"));
        assert!(config.identify().is_err());

        assert!(IntentsSetting::parse("513").resolve().is_ok());
    }

    #[test]
    fn test_missing_or_invalid_file_uses_defaults() {
        let config = GatewayConfig::load_from_file("/nonexistent/gateway.yaml").unwrap();
        assert_eq!(config.port, 443);

        let config = config_from("port: [not a port");
        assert_eq!(config.host, "gateway.discord.gg");
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("GATEWAY_TOKEN", "from-env"),
            ("GATEWAY_INTENTS", "GUILDS, DIRECT_MESSAGES"),
            ("GATEWAY_PORT", "not-a-port"),
            ("GATEWAY_TLS", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config.apply_environment_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.token, "from-env");
        assert_eq!(config.port, 443);
        assert!(!config.tls);
        assert_eq!(
            config.intents.resolve().unwrap(),
            Intents::GUILDS | Intents::DIRECT_MESSAGES
        );
    }

    #[test]
    fn test_identify_requires_token_and_known_intents() {
        let mut config = GatewayConfig::default();
        assert!(config.identify().is_err());

        config.token = "t".to_string();
        config.intents = IntentsSetting::Names(vec!["NOT_AN_INTENT".to_string()]);
        assert!(config.identify().is_err());

        config.intents = IntentsSetting::parse("GUILDS");
        let identify = config.identify().unwrap();
        assert_eq!(identify.intents(), Intents::GUILDS);
    }
}
