//! Gateway client binary.
//!
//! Connects to the real-time event gateway, identifies, keeps the
//! connection alive with heartbeats and logs every event it receives until
//! SIGINT or SIGTERM.

use clap::Parser;
use gateway_session::{shutdown, Pipeline, Session, SessionError};
use gateway_wire::{Frame, OpCode};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::{GatewayConfig, IntentsSetting};
use logging::GatewayLogFormatter;

/// Real-time event gateway client
#[derive(Parser, Debug)]
#[command(name = "redb-gateway", version, about = "Real-time event gateway client")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "gateway.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Bot token; overrides the config file and GATEWAY_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Intents as comma-separated names or a raw bitmask, e.g. GUILDS,GUILD_MESSAGES
    #[arg(long)]
    intents: Option<String>,

    /// WebSocket handshake timeout, e.g. 10s
    #[arg(long)]
    handshake_timeout: Option<humantime::Duration>,
}

impl Args {
    fn apply_to(&self, config: &mut GatewayConfig) {
        if let Some(token) = &self.token {
            config.token = token.clone();
        }
        if let Some(intents) = &self.intents {
            config.intents = IntentsSetting::parse(intents);
        }
        if let Some(timeout) = &self.handshake_timeout {
            config.handshake_timeout = timeout.to_string();
        }
    }
}

fn log_frame(frame: &Frame) -> anyhow::Result<()> {
    match frame.opcode() {
        Some(OpCode::Dispatch) => info!(
            seq = ?frame.sequence(),
            "Event {}",
            frame.event_type().unwrap_or("<unnamed>")
        ),
        Some(OpCode::HeartbeatAck) => debug!("Heartbeat acknowledged"),
        Some(OpCode::Reconnect) => warn!("Gateway asked the client to reconnect"),
        Some(OpCode::InvalidSession) => warn!("Gateway reported an invalid session"),
        Some(op) => debug!("Received {}", op),
        None => warn!("Received unknown opcode {}", frame.op),
    }
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("redb_gateway={}", args.log_level).parse()?)
        .add_directive(format!("gateway_session={}", args.log_level).parse()?)
        .add_directive(format!("gateway_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .event_format(GatewayLogFormatter::new("gateway"))
        .init();

    info!("Starting reDB Gateway client v{}", env!("CARGO_PKG_VERSION"));

    let mut gateway_config = GatewayConfig::load_from_file(&args.config)?;
    args.apply_to(&mut gateway_config);

    let identify = gateway_config.identify()?;
    let options = gateway_config.connect_options()?;
    info!("Identifying with intents {:?}", identify.intents());

    let mut session = Session::connect(&options, &identify, Pipeline::standard(log_frame)).await?;

    let control = session.control();
    shutdown::on_signal(move |signal| {
        Box::pin(async move {
            info!("Received {:?}, closing gateway session", signal);
            if let Err(e) = control.shutdown(shutdown::GRACEFUL_CLOSE).await {
                warn!("Graceful close failed: {}", e);
            }
        })
    });

    match session.start().await {
        Ok(()) => {
            info!("Gateway client stopped");
            Ok(())
        }
        Err(e) => {
            if let Some(code) = e.close_code() {
                let advice = if code.should_reconnect() {
                    "safe to reconnect"
                } else {
                    "do not reconnect without fixing the configuration"
                };
                error!("Closed with {}: {} ({})", code.code(), code.describe(), advice);
            } else if let SessionError::Closed { code: Some(code) } = &e {
                error!("Closed with unrecognized code {}", code);
            }
            Err(e.into())
        }
    }
}
