//! Ordered chain of stages every inbound frame passes through.
//!
//! A [`Pipeline`] is a plain list of [`Stage`] objects, built once per
//! session and run front to back for each frame. Each stage handles one
//! concern and either lets the frame continue, drops it, or fails the
//! session. The last stage is always the user's handler.

use async_trait::async_trait;
use gateway_wire::Frame;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::SessionError;
use crate::heartbeat::HeartbeatDriver;
use crate::sequence::Sequence;
use crate::stages::{
    EnvelopeDecode, FrameHandler, HeartbeatIntercept, SequenceUpdate, TextFilter, UserHandler,
};
use crate::transport::RawFrame;
use crate::writer::GatewayWriter;

/// Whether the session is still waiting for hello
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First frame; only a textual hello is acceptable
    Handshake,
    /// Receive loop after identify
    Live,
}

/// A frame on its way through the pipeline.
///
/// Owned by exactly one dispatch and dropped when it returns.
#[derive(Debug)]
pub struct Inbound {
    /// Transport payload as read
    pub raw: RawFrame,
    /// Decoded envelope, filled in by the decode stage
    pub frame: Option<Frame>,
}

impl Inbound {
    fn new(raw: RawFrame) -> Self {
        Self { raw, frame: None }
    }
}

/// Session state a stage may read or act on
pub struct StageContext<'a> {
    /// Handshake or live
    pub phase: Phase,
    /// Last sequence observed
    pub sequence: &'a Sequence,
    /// Serialized write path
    pub writer: &'a GatewayWriter,
    /// The session's heartbeat driver
    pub heartbeat: &'a HeartbeatDriver,
    /// Identify frame, already encoded
    pub identify: &'a str,
    /// Where the heartbeat task reports a failed beat
    pub failures: &'a mpsc::UnboundedSender<SessionError>,
}

/// What a stage decided about the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Hand the frame to the next stage
    Continue,
    /// Discard the frame; later stages do not see it
    Drop,
    /// The user handler rejected the frame
    HandlerFailed,
}

/// One concern applied to each inbound frame
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs and [`Outcome::Dropped`]
    fn name(&self) -> &'static str;

    /// Process the frame. An error ends the session.
    async fn handle(
        &self,
        inbound: &mut Inbound,
        ctx: &StageContext<'_>,
    ) -> Result<Flow, SessionError>;
}

/// Result of one pass through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every stage ran, including the handler
    Delivered,
    /// A stage dropped the frame
    Dropped(&'static str),
    /// The handler failed; the error was logged
    HandlerFailed,
}

/// Ordered list of stages ending in the user handler
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Start building a pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// The gateway's standard chain around `handler`:
    /// text filter, envelope decode, sequence update, heartbeat intercept.
    pub fn standard<H: FrameHandler + 'static>(handler: H) -> Self {
        Self::builder()
            .stage(TextFilter)
            .stage(EnvelopeDecode)
            .stage(SequenceUpdate)
            .stage(HeartbeatIntercept)
            .handler(handler)
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run one frame through every stage
    pub async fn dispatch(
        &self,
        raw: RawFrame,
        ctx: &StageContext<'_>,
    ) -> Result<Outcome, SessionError> {
        let mut inbound = Inbound::new(raw);
        for stage in &self.stages {
            match stage.handle(&mut inbound, ctx).await? {
                Flow::Continue => {}
                Flow::Drop => {
                    trace!(stage = stage.name(), "Frame dropped");
                    return Ok(Outcome::Dropped(stage.name()));
                }
                Flow::HandlerFailed => return Ok(Outcome::HandlerFailed),
            }
        }
        Ok(Outcome::Delivered)
    }
}

/// Builder for [`Pipeline`]; the handler is always added last
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    /// Append a stage
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Finish with the terminal user handler
    pub fn handler<H: FrameHandler + 'static>(mut self, handler: H) -> Pipeline {
        self.stages.push(Box::new(UserHandler::new(handler)));
        Pipeline {
            stages: self.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{self, Sent};
    use std::sync::{Arc, Mutex};

    struct Harness {
        sequence: Arc<Sequence>,
        writer: GatewayWriter,
        heartbeat: HeartbeatDriver,
        failures: mpsc::UnboundedSender<SessionError>,
        peer: memory::MemoryPeer,
        _source: Box<dyn crate::transport::FrameSource>,
    }

    impl Harness {
        fn new() -> Self {
            let (source, sink, peer) = memory::pair();
            let sequence = Arc::new(Sequence::new());
            let writer = GatewayWriter::new(sink, Arc::clone(&sequence));
            let (failures, _) = mpsc::unbounded_channel();
            Self {
                sequence,
                writer,
                heartbeat: HeartbeatDriver::new(),
                failures,
                peer,
                _source: source,
            }
        }

        fn ctx(&self, phase: Phase) -> StageContext<'_> {
            StageContext {
                phase,
                sequence: &self.sequence,
                writer: &self.writer,
                heartbeat: &self.heartbeat,
                identify: r#"{"op":2}"#,
                failures: &self.failures,
            }
        }
    }

    fn text(json: &str) -> RawFrame {
        RawFrame::Text(json.to_string())
    }

    fn collecting() -> (impl FrameHandler, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = move |frame: &Frame| -> anyhow::Result<()> {
            sink.lock().unwrap().push(frame.op);
            Ok(())
        };
        (handler, seen)
    }

    #[test]
    fn test_standard_stage_order() {
        let (handler, _) = collecting();
        let pipeline = Pipeline::standard(handler);
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "text_filter",
                "envelope_decode",
                "sequence_update",
                "heartbeat_intercept",
                "user_handler"
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatch_delivers_every_opcode() {
        let harness = Harness::new();
        let (handler, seen) = collecting();
        let pipeline = Pipeline::standard(handler);
        let ctx = harness.ctx(Phase::Live);

        for json in [
            r#"{"op":0,"s":5,"t":"READY","d":{}}"#,
            r#"{"op":11,"d":null}"#,
            r#"{"op":7,"d":null}"#,
            r#"{"op":300,"d":null}"#,
        ] {
            let outcome = pipeline.dispatch(text(json), &ctx).await.unwrap();
            assert_eq!(outcome, Outcome::Delivered);
        }

        assert_eq!(*seen.lock().unwrap(), vec![0, 11, 7, 300]);
        assert_eq!(harness.sequence.get(), Some(5));
    }

    #[tokio::test]
    async fn test_heartbeat_request_is_answered_and_forwarded() {
        let mut harness = Harness::new();
        harness.sequence.merge(Some(9));
        let (handler, seen) = collecting();
        let pipeline = Pipeline::standard(handler);

        let outcome = pipeline
            .dispatch(text(r#"{"op":1,"d":null}"#), &harness.ctx(Phase::Live))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(
            harness.peer.outbound.recv().await,
            Some(Sent::Text(r#"{"op":1,"d":9}"#.to_string()))
        );
    }

    #[tokio::test]
    async fn test_custom_pipeline_without_decode_drops_at_handler() {
        let harness = Harness::new();
        let (handler, seen) = collecting();
        let pipeline = Pipeline::builder().stage(TextFilter).handler(handler);

        let outcome = pipeline
            .dispatch(text(r#"{"op":0,"d":{}}"#), &harness.ctx(Phase::Live))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Dropped("user_handler"));
        assert!(seen.lock().unwrap().is_empty());
    }
}
