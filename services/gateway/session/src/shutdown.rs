//! Shutdown context for one session and signal registration.
//!
//! A [`SessionControl`] is bound to a single session, so any number of
//! sessions can run in one process, each with its own signal handler.

use futures::future::BoxFuture;
use gateway_wire::{CloseCode, OutboundFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::SessionError;
use crate::heartbeat::HeartbeatDriver;
use crate::writer::GatewayWriter;

/// Close code used for a graceful shutdown; the client appears offline at once
pub const GRACEFUL_CLOSE: u16 = CloseCode::Normal as u16;

/// Cloneable handle for stopping a session and sending on its behalf
#[derive(Clone)]
pub struct SessionControl {
    writer: GatewayWriter,
    heartbeat: HeartbeatDriver,
    shutting_down: Arc<AtomicBool>,
}

impl SessionControl {
    pub(crate) fn new(writer: GatewayWriter, heartbeat: HeartbeatDriver) -> Self {
        Self {
            writer,
            heartbeat,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the heartbeat and close the transport with `code`.
    ///
    /// The receive loop sees the close as end of stream and returns
    /// `Ok(())`. Calling this more than once is a no-op.
    pub async fn shutdown(&self, code: u16) -> Result<(), SessionError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return Ok(());
        }

        info!("Shutting down gateway session with close code {}", code);
        self.heartbeat.kill();
        self.writer.close(code).await.map_err(SessionError::Write)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Send an outbound frame under the write lock
    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), SessionError> {
        let json = frame.to_json().map_err(SessionError::Encode)?;
        debug!(op = %frame.op, "Sending outbound frame");
        self.writer.send_text(&json).await.map_err(SessionError::Write)
    }
}

/// Process signal that requested shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok(ShutdownSignal::Terminate),
        _ = sigint.recv() => Ok(ShutdownSignal::Interrupt),
    }
}

/// Wait for Ctrl-C
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}

/// Run `handler` once when the process receives a shutdown signal.
///
/// The handler usually captures a [`SessionControl`]:
///
/// ```no_run
/// # use gateway_session::{shutdown, SessionControl};
/// # fn register(control: SessionControl) {
/// shutdown::on_signal(move |_signal| {
///     Box::pin(async move {
///         let _ = control.shutdown(shutdown::GRACEFUL_CLOSE).await;
///     })
/// });
/// # }
/// ```
pub fn on_signal<F>(handler: F) -> JoinHandle<()>
where
    F: FnOnce(ShutdownSignal) -> BoxFuture<'static, ()> + Send + 'static,
{
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!("Received {:?}, shutting down", signal);
                handler(signal).await;
            }
            Err(e) => error!("Failed to register signal handlers: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatPhase;
    use crate::sequence::Sequence;
    use crate::transport::memory::{self, Sent};
    use gateway_wire::Snowflake;
    use tokio::sync::mpsc;

    fn control() -> (SessionControl, memory::MemoryPeer, Box<dyn crate::transport::FrameSource>) {
        let (source, sink, peer) = memory::pair();
        let writer = GatewayWriter::new(sink, Arc::new(Sequence::new()));
        (SessionControl::new(writer, HeartbeatDriver::new()), peer, source)
    }

    #[tokio::test]
    async fn test_shutdown_closes_once() {
        let (control, mut peer, mut source) = control();

        control.shutdown(GRACEFUL_CLOSE).await.unwrap();
        control.shutdown(4000).await.unwrap();

        assert!(control.is_shutting_down());
        assert!(peer.is_closed());
        assert_eq!(peer.outbound.recv().await, Some(Sent::Close(1000)));
        assert!(peer.outbound.try_recv().is_err());
        // the blocked reader is released by the close
        assert_eq!(source.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shutdown_kills_heartbeat() {
        let (source, sink, _peer) = memory::pair();
        let writer = GatewayWriter::new(sink, Arc::new(Sequence::new()));
        let heartbeat = HeartbeatDriver::new();
        let (failures, _rx) = mpsc::unbounded_channel();
        heartbeat.start(std::time::Duration::from_secs(30), writer.clone(), failures);

        let control = SessionControl::new(writer, heartbeat.clone());
        control.shutdown(GRACEFUL_CLOSE).await.unwrap();
        heartbeat.join().await;

        assert_eq!(heartbeat.phase(), HeartbeatPhase::Stopped);
        drop(source);
    }

    #[tokio::test]
    async fn test_send_outbound_frame() {
        let (control, mut peer, _source) = control();

        let frame = OutboundFrame::request_soundboard_sounds(&[Snowflake(42)]);
        control.send(&frame).await.unwrap();

        match peer.outbound.recv().await {
            Some(Sent::Text(json)) => {
                let value: serde_json::Value = serde_json::from_str(&json).unwrap();
                assert_eq!(value["op"], 31);
            }
            other => panic!("unexpected write: {other:?}"),
        }

        control.shutdown(GRACEFUL_CLOSE).await.unwrap();
        assert!(matches!(
            control.send(&frame).await,
            Err(SessionError::Write(_))
        ));
    }
}
