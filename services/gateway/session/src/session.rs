//! Gateway session: connect, handshake, identify, then the receive loop.
//!
//! A session runs two tasks. The caller's task owns [`Session::start`],
//! which reads frames and feeds them through the [`Pipeline`]; the
//! heartbeat driver runs alongside it once hello has been seen. Both write
//! through the same [`GatewayWriter`].

use gateway_wire::{Identify, OutboundFrame};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, TransportError};
use crate::heartbeat::HeartbeatDriver;
use crate::pipeline::{Outcome, Phase, Pipeline, StageContext};
use crate::sequence::Sequence;
use crate::shutdown::SessionControl;
use crate::transport::{self, ConnectOptions, FrameSink, FrameSource};
use crate::writer::GatewayWriter;

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames read from the transport
    pub frames_received: u64,
    /// Frames dropped by a stage
    pub frames_dropped: u64,
    /// Frames the user handler failed on
    pub handler_failures: u64,
    /// Heartbeats written, timer and on request
    pub heartbeats_sent: u64,
}

impl SessionStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Delivered => {}
            Outcome::Dropped(_) => self.frames_dropped += 1,
            Outcome::HandlerFailed => self.handler_failures += 1,
        }
    }
}

/// A connected gateway session
pub struct Session {
    source: Box<dyn FrameSource>,
    writer: GatewayWriter,
    sequence: Arc<Sequence>,
    heartbeat: HeartbeatDriver,
    identify: String,
    pipeline: Pipeline,
    control: SessionControl,
    failures_tx: mpsc::UnboundedSender<SessionError>,
    failures_rx: mpsc::UnboundedReceiver<SessionError>,
    stats: SessionStats,
}

impl Session {
    /// Connect and complete the WebSocket handshake
    pub async fn connect(
        options: &ConnectOptions,
        identify: &Identify,
        pipeline: Pipeline,
    ) -> Result<Self, SessionError> {
        info!("Connecting to gateway at {}", options.url());
        let (source, sink) = transport::connect(options).await.map_err(|e| match e {
            TransportError::Connect { .. } => SessionError::Connect(e),
            other => SessionError::Handshake(other),
        })?;
        Self::from_transport(source, sink, identify, pipeline)
    }

    /// Build a session over an already connected transport
    pub fn from_transport(
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        identify: &Identify,
        pipeline: Pipeline,
    ) -> Result<Self, SessionError> {
        let identify = identify.to_json().map_err(SessionError::Encode)?;
        let sequence = Arc::new(Sequence::new());
        let writer = GatewayWriter::new(sink, Arc::clone(&sequence));
        let heartbeat = HeartbeatDriver::new();
        let control = SessionControl::new(writer.clone(), heartbeat.clone());
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        debug!("Session pipeline: {:?}", pipeline.stage_names());
        Ok(Self {
            source,
            writer,
            sequence,
            heartbeat,
            identify,
            pipeline,
            control,
            failures_tx,
            failures_rx,
            stats: SessionStats::default(),
        })
    }

    /// Shutdown handle bound to this session
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Last sequence number observed
    pub fn sequence(&self) -> Option<u64> {
        self.sequence.get()
    }

    /// The session's heartbeat driver
    pub fn heartbeat(&self) -> &HeartbeatDriver {
        &self.heartbeat
    }

    /// Counters so far
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            heartbeats_sent: self.writer.heartbeats_sent(),
            ..self.stats
        }
    }

    /// Send a heartbeat with the current sequence now
    pub async fn heartbeat_now(&self) -> Result<Option<u64>, SessionError> {
        self.writer.heartbeat_now().await
    }

    /// Send an outbound frame under the write lock
    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), SessionError> {
        self.control.send(frame).await
    }

    /// Close the transport with `code` without marking a shutdown.
    ///
    /// The receive loop then ends with [`SessionError::Closed`].
    pub async fn disconnect(&self, code: u16) -> Result<(), SessionError> {
        info!("Disconnecting with close code {}", code);
        self.writer.close(code).await.map_err(SessionError::Write)
    }

    /// Wait for hello, identify, then process frames until the connection ends.
    ///
    /// Returns `Ok(())` only after [`SessionControl::shutdown`]; any other
    /// end of the connection is an error. The heartbeat is stopped on every
    /// path.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let result = self.receive().await;

        self.heartbeat.kill();
        self.heartbeat.join().await;

        match &result {
            Ok(()) => info!("Gateway session ended"),
            Err(e) => error!("Gateway session failed: {}", e),
        }
        info!("Session stats: {:?}", self.stats());
        result
    }

    async fn receive(&mut self) -> Result<(), SessionError> {
        let Session {
            source,
            writer,
            sequence,
            heartbeat,
            identify,
            pipeline,
            control,
            failures_tx,
            failures_rx,
            stats,
        } = self;

        let mut ctx = StageContext {
            phase: Phase::Handshake,
            sequence: sequence.as_ref(),
            writer,
            heartbeat,
            identify: identify.as_str(),
            failures: failures_tx,
        };

        let first = match source.read().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return end_of_stream(control, source.close_code()),
            Err(e) => return read_failed(control, e),
        };
        stats.frames_received += 1;
        stats.record(pipeline.dispatch(first, &ctx).await?);

        ctx.phase = Phase::Live;
        loop {
            tokio::select! {
                read = source.read() => match read {
                    Ok(Some(raw)) => {
                        stats.frames_received += 1;
                        stats.record(pipeline.dispatch(raw, &ctx).await?);
                    }
                    Ok(None) => return end_of_stream(control, source.close_code()),
                    Err(e) => return read_failed(control, e),
                },
                Some(err) = failures_rx.recv() => return Err(err),
            }
        }
    }
}

fn end_of_stream(control: &SessionControl, code: Option<u16>) -> Result<(), SessionError> {
    if control.is_shutting_down() {
        debug!("Connection closed after shutdown");
        return Ok(());
    }
    let err = SessionError::Closed { code };
    if let Some(known) = err.close_code() {
        warn!(
            "Gateway closed the connection: {} (reconnect: {})",
            known.describe(),
            known.should_reconnect()
        );
    }
    Err(err)
}

fn read_failed(control: &SessionControl, e: TransportError) -> Result<(), SessionError> {
    if control.is_shutting_down() {
        debug!("Read ended during shutdown: {}", e);
        return Ok(());
    }
    Err(SessionError::Read(e))
}
