//! The standard pipeline stages and the user handler boundary.

use async_trait::async_trait;
use futures::FutureExt;
use gateway_wire::{Frame, OpCode};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::pipeline::{Flow, Inbound, Phase, Stage, StageContext};
use crate::transport::RawFrame;

/// Application code invoked with every decoded frame.
///
/// Errors and panics are logged and discarded; they never end the session.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Handle one frame
    async fn on_frame(&self, frame: &Frame) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> FrameHandler for F
where
    F: Fn(&Frame) -> anyhow::Result<()> + Send + Sync,
{
    async fn on_frame(&self, frame: &Frame) -> anyhow::Result<()> {
        self(frame)
    }
}

/// Drops binary frames; during the handshake they are fatal
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFilter;

#[async_trait]
impl Stage for TextFilter {
    fn name(&self) -> &'static str {
        "text_filter"
    }

    async fn handle(
        &self,
        inbound: &mut Inbound,
        ctx: &StageContext<'_>,
    ) -> Result<Flow, SessionError> {
        match (&inbound.raw, ctx.phase) {
            (RawFrame::Text(_), _) => Ok(Flow::Continue),
            (RawFrame::Binary(data), Phase::Handshake) => Err(SessionError::HelloUnexpected(
                format!("binary frame of {} bytes", data.len()),
            )),
            (RawFrame::Binary(data), Phase::Live) => {
                warn!("Dropping non-text frame of {} bytes", data.len());
                Ok(Flow::Drop)
            }
        }
    }
}

/// Parses the `{op, s, t, d}` envelope; malformed JSON is fatal
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeDecode;

#[async_trait]
impl Stage for EnvelopeDecode {
    fn name(&self) -> &'static str {
        "envelope_decode"
    }

    async fn handle(
        &self,
        inbound: &mut Inbound,
        _ctx: &StageContext<'_>,
    ) -> Result<Flow, SessionError> {
        let RawFrame::Text(text) = &inbound.raw else {
            return Ok(Flow::Drop);
        };
        let frame = Frame::decode(text).map_err(|e| {
            error!("Malformed gateway envelope: {}", e);
            SessionError::EnvelopeDecode(e)
        })?;
        debug!(op = frame.op, seq = ?frame.s, t = ?frame.t, "Received frame");
        inbound.frame = Some(frame);
        Ok(Flow::Continue)
    }
}

/// Merges the frame's sequence number, whatever its opcode
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceUpdate;

#[async_trait]
impl Stage for SequenceUpdate {
    fn name(&self) -> &'static str {
        "sequence_update"
    }

    async fn handle(
        &self,
        inbound: &mut Inbound,
        ctx: &StageContext<'_>,
    ) -> Result<Flow, SessionError> {
        if let Some(frame) = &inbound.frame {
            ctx.sequence.merge(frame.sequence());
        }
        Ok(Flow::Continue)
    }
}

/// Reacts to hello and heartbeat requests.
///
/// On hello during the handshake it sends identify before starting the
/// heartbeat driver; a later hello restarts the existing driver. A
/// heartbeat request is answered at once. Both are still forwarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeartbeatIntercept;

#[async_trait]
impl Stage for HeartbeatIntercept {
    fn name(&self) -> &'static str {
        "heartbeat_intercept"
    }

    async fn handle(
        &self,
        inbound: &mut Inbound,
        ctx: &StageContext<'_>,
    ) -> Result<Flow, SessionError> {
        let Some(frame) = &inbound.frame else {
            return Ok(Flow::Continue);
        };

        match (frame.opcode(), ctx.phase) {
            (Some(OpCode::Hello), phase) => {
                let hello = frame.hello().map_err(SessionError::EnvelopeDecode)?;
                let interval = hello.interval();
                if phase == Phase::Handshake {
                    info!("Received hello, heartbeat interval {:?}", interval);
                    ctx.writer
                        .send_text(ctx.identify)
                        .await
                        .map_err(SessionError::Write)?;
                    info!("Sent identify");
                } else {
                    warn!("Received hello on a live connection");
                }
                ctx.heartbeat
                    .start(interval, ctx.writer.clone(), ctx.failures.clone());
            }
            (opcode, Phase::Handshake) => {
                let got = match opcode {
                    Some(op) => op.to_string(),
                    None => format!("unknown opcode {}", frame.op),
                };
                return Err(SessionError::HelloUnexpected(got));
            }
            (Some(OpCode::Heartbeat), Phase::Live) => {
                debug!("Gateway requested a heartbeat");
                ctx.writer.heartbeat_now().await?;
            }
            (_, Phase::Live) => {}
        }
        Ok(Flow::Continue)
    }
}

/// Terminal stage wrapping a [`FrameHandler`]
pub struct UserHandler<H> {
    handler: H,
}

impl<H: FrameHandler> UserHandler<H> {
    /// Wrap `handler`
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[async_trait]
impl<H: FrameHandler> Stage for UserHandler<H> {
    fn name(&self) -> &'static str {
        "user_handler"
    }

    async fn handle(
        &self,
        inbound: &mut Inbound,
        _ctx: &StageContext<'_>,
    ) -> Result<Flow, SessionError> {
        let Some(frame) = &inbound.frame else {
            warn!("Handler reached without a decoded frame");
            return Ok(Flow::Drop);
        };

        match AssertUnwindSafe(self.handler.on_frame(frame))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(Flow::Continue),
            Ok(Err(e)) => {
                error!(op = frame.op, "Frame handler failed: {:#}", e);
                Ok(Flow::HandlerFailed)
            }
            Err(payload) => {
                error!(
                    op = frame.op,
                    "Frame handler panicked: {}",
                    panic_message(payload.as_ref())
                );
                Ok(Flow::HandlerFailed)
            }
        }
    }
}
