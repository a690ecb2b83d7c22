//! WebSocket transport, handshake, heartbeat and frame pipeline for gateway sessions.
//!
//! A [`Session`] owns one gateway connection. It waits for hello, sends
//! Identify, starts the [`HeartbeatDriver`] at the announced interval and
//! then feeds every inbound frame through a [`Pipeline`] of stages ending
//! in the caller's [`FrameHandler`].
//!
//! ## Features
//!
//! - **Transport**: WebSocket over TCP or rustls TLS, plus an in-memory pair for tests
//! - **Heartbeat**: a single timer task per session that can be restarted or killed
//! - **Pipeline**: text filter, envelope decode, sequence tracking, heartbeat intercept
//! - **Isolation**: handler errors and panics are logged and never end the session
//! - **Shutdown**: a per-session [`SessionControl`] wired to process signals
//!
//! ## Example
//!
//! ```rust,no_run
//! use gateway_session::{shutdown, ConnectOptions, Pipeline, Session};
//! use gateway_wire::{ConnectionProperties, Frame, Identify, Intents};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let identify = Identify::new(
//!     "bot-token",
//!     Intents::GUILDS | Intents::GUILD_MESSAGES,
//!     ConnectionProperties::for_library("my-bot"),
//! );
//! let pipeline = Pipeline::standard(|frame: &Frame| -> anyhow::Result<()> {
//!     println!("op {} t {:?}", frame.op, frame.event_type());
//!     Ok(())
//! });
//!
//! let options = ConnectOptions::gateway("gateway.discord.gg");
//! let mut session = Session::connect(&options, &identify, pipeline).await?;
//!
//! let control = session.control();
//! shutdown::on_signal(move |_| {
//!     Box::pin(async move {
//!         let _ = control.shutdown(shutdown::GRACEFUL_CLOSE).await;
//!     })
//! });
//!
//! session.start().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod heartbeat;
pub mod pipeline;
pub mod sequence;
pub mod session;
pub mod shutdown;
pub mod stages;
pub mod transport;
pub mod writer;

// Re-export main types
pub use error::{SessionError, TransportError};
pub use heartbeat::{Beat, HeartbeatDriver, HeartbeatPhase, HeartbeatSignal, HeartbeatState, StartOutcome};
pub use pipeline::{Flow, Inbound, Outcome, Phase, Pipeline, PipelineBuilder, Stage, StageContext};
pub use sequence::Sequence;
pub use session::{Session, SessionStats};
pub use shutdown::{on_signal, SessionControl, ShutdownSignal, GRACEFUL_CLOSE};
pub use stages::{EnvelopeDecode, FrameHandler, HeartbeatIntercept, SequenceUpdate, TextFilter, UserHandler};
pub use transport::{connect, ConnectOptions, FrameSink, FrameSource, RawFrame};
pub use writer::GatewayWriter;
