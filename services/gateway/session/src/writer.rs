//! Serialized outbound path shared by the receive loop and the heartbeat task.
//!
//! Every outbound frame goes through one `tokio::sync::Mutex`, so at most
//! one transport write is in flight at a time. The heartbeat scratch buffer
//! lives under the same lock.

use gateway_wire::HeartbeatBuffer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{SessionError, TransportError};
use crate::sequence::Sequence;
use crate::transport::FrameSink;

struct Outbound {
    sink: Box<dyn FrameSink>,
    beat: HeartbeatBuffer,
}

struct WriterInner {
    outbound: Mutex<Outbound>,
    sequence: Arc<Sequence>,
    heartbeats_sent: AtomicU64,
}

/// Cloneable handle to the session's write path
#[derive(Clone)]
pub struct GatewayWriter {
    inner: Arc<WriterInner>,
}

impl GatewayWriter {
    /// Wrap a transport writer; heartbeats read `sequence`
    pub fn new(sink: Box<dyn FrameSink>, sequence: Arc<Sequence>) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                outbound: Mutex::new(Outbound {
                    sink,
                    beat: HeartbeatBuffer::new(),
                }),
                sequence,
                heartbeats_sent: AtomicU64::new(0),
            }),
        }
    }

    /// Send one text frame
    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let mut outbound = self.inner.outbound.lock().await;
        trace!("Sending {} byte frame", text.len());
        outbound.sink.write(text).await
    }

    /// Send a heartbeat carrying the current sequence (or `null`).
    ///
    /// Returns the sequence that was sent.
    pub async fn heartbeat_now(&self) -> Result<Option<u64>, SessionError> {
        let mut guard = self.inner.outbound.lock().await;
        let outbound = &mut *guard;

        // read under the lock so a beat never carries a value older than one already sent
        let sequence = self.inner.sequence.get();
        let text = outbound.beat.format(sequence).map_err(SessionError::Encode)?;
        outbound.sink.write(text).await.map_err(SessionError::Write)?;

        self.inner.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
        debug!(seq = ?sequence, "Sent heartbeat");
        Ok(sequence)
    }

    /// Close the transport with `code`
    pub async fn close(&self, code: u16) -> Result<(), TransportError> {
        let mut outbound = self.inner.outbound.lock().await;
        outbound.sink.close(code).await
    }

    /// Heartbeats written so far
    pub fn heartbeats_sent(&self) -> u64 {
        self.inner.heartbeats_sent.load(Ordering::Relaxed)
    }
}
