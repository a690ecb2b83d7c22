//! Framed duplex transport for gateway sessions.
//!
//! The session only needs a reader half that blocks until the next frame
//! arrives and a writer half that can send text frames and close the
//! connection. [`connect`] provides both over a WebSocket (optionally TLS);
//! `memory` (tests and the `test-util` feature) provides an in-process
//! pair for driving sessions without a network.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use gateway_wire::{API_VERSION, ENCODING};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::error::TransportError;

/// One inbound transport frame, before any decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
}

impl RawFrame {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            RawFrame::Text(text) => text.len(),
            RawFrame::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reader half of a transport
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame; `Ok(None)` once the connection has closed
    async fn read(&mut self) -> Result<Option<RawFrame>, TransportError>;

    /// Close code received from the peer, once closed
    fn close_code(&self) -> Option<u16>;
}

/// Writer half of a transport. Callers serialize access.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn write(&mut self, text: &str) -> Result<(), TransportError>;

    /// Close the connection with `code`; best effort
    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// Where and how to open the gateway connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Gateway host name
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Use TLS (`wss`)
    pub tls: bool,
    /// Request path including the query string
    pub path: String,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Upper bound for the WebSocket upgrade
    pub handshake_timeout: Duration,
}

impl ConnectOptions {
    /// Options for the gateway at `host`, negotiating the default version and encoding
    pub fn gateway(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 443,
            tls: true,
            path: Self::gateway_path(API_VERSION, ENCODING),
            headers: Vec::new(),
            handshake_timeout: Duration::from_secs(10),
        }
    }

    /// Path negotiating protocol version and payload encoding
    pub fn gateway_path(version: u8, encoding: &str) -> String {
        format!("/?v={}&encoding={}", version, encoding)
    }

    /// Full WebSocket URL
    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reader half of a WebSocket connection
pub struct WsSource {
    stream: SplitStream<WsStream>,
    close_code: Option<u16>,
}

/// Writer half of a WebSocket connection
pub struct WsSink {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

/// Connect, perform the WebSocket upgrade, and split the connection
pub async fn connect(
    options: &ConnectOptions,
) -> Result<(Box<dyn FrameSource>, Box<dyn FrameSink>), TransportError> {
    let addr = format!("{}:{}", options.host, options.port);
    debug!("Dialing {}", addr);

    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
    tcp.set_nodelay(true).ok();

    if options.tls {
        // Install default crypto provider if not already set
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    let mut request = options
        .url()
        .into_client_request()
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::Handshake(format!("header {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::Handshake(format!("header {}: {}", name, e)))?;
        request.headers_mut().insert(name, value);
    }

    let (ws, response) = tokio::time::timeout(
        options.handshake_timeout,
        tokio_tungstenite::client_async_tls(request, tcp),
    )
    .await
    .map_err(|_| TransportError::HandshakeTimeout(options.handshake_timeout))?
    .map_err(|e| TransportError::Handshake(e.to_string()))?;

    debug!(
        "WebSocket handshake with {} complete (status {})",
        addr,
        response.status()
    );

    let (sink, stream) = ws.split();
    Ok((
        Box::new(WsSource {
            stream,
            close_code: None,
        }),
        Box::new(WsSink { sink, closed: false }),
    ))
}

#[async_trait]
impl FrameSource for WsSource {
    async fn read(&mut self) -> Result<Option<RawFrame>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(RawFrame::Text(text.to_string()))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(RawFrame::Binary(data))),
                Some(Ok(Message::Close(frame))) => {
                    self.close_code = frame.map(|f| f.code.into());
                    debug!("Received close frame (code {:?})", self.close_code);
                    return Ok(None);
                }
                // Control frames are answered by tungstenite itself
                Some(Ok(other)) => trace!("Skipping control frame: {:?}", other),
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None)
                }
                Some(Err(e)) => return Err(TransportError::Read(e.to_string())),
            }
        }
    }

    fn close_code(&self) -> Option<u16> {
        self.close_code
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn write(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: String::new().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        debug!("Sent close frame (code {})", code);
        Ok(())
    }
}

/// In-process transport pair
#[cfg(any(test, feature = "test-util"))]
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Notify};

    /// What the session wrote to the transport
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        /// A text frame
        Text(String),
        /// A close with the given code
        Close(u16),
    }

    #[derive(Default)]
    struct Shared {
        closed: AtomicBool,
        close_wake: Notify,
        fail_writes: AtomicBool,
    }

    /// Reader half fed by [`MemoryPeer::inbound`]
    pub struct MemorySource {
        rx: mpsc::UnboundedReceiver<RawFrame>,
        shared: Arc<Shared>,
        close_code: Option<u16>,
    }

    /// Writer half drained through [`MemoryPeer::outbound`]
    pub struct MemorySink {
        tx: mpsc::UnboundedSender<Sent>,
        shared: Arc<Shared>,
    }

    /// The far end of an in-memory connection
    pub struct MemoryPeer {
        /// Frames delivered to the session's reader
        pub inbound: mpsc::UnboundedSender<RawFrame>,
        /// Frames written by the session
        pub outbound: mpsc::UnboundedReceiver<Sent>,
        shared: Arc<Shared>,
    }

    impl MemoryPeer {
        /// Queue a text frame for the session
        pub fn send_text(&self, text: impl Into<String>) {
            let _ = self.inbound.send(RawFrame::Text(text.into()));
        }

        /// Make every subsequent write fail
        pub fn fail_writes(&self) {
            self.shared.fail_writes.store(true, Ordering::SeqCst);
        }

        /// Whether the session closed its side
        pub fn is_closed(&self) -> bool {
            self.shared.closed.load(Ordering::SeqCst)
        }
    }

    /// Create a connected reader/writer pair and its peer
    pub fn pair() -> (Box<dyn FrameSource>, Box<dyn FrameSink>, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let source = MemorySource {
            rx: in_rx,
            shared: Arc::clone(&shared),
            close_code: None,
        };
        let sink = MemorySink {
            tx: out_tx,
            shared: Arc::clone(&shared),
        };
        let peer = MemoryPeer {
            inbound: in_tx,
            outbound: out_rx,
            shared,
        };
        (Box::new(source), Box::new(sink), peer)
    }

    #[async_trait]
    impl FrameSource for MemorySource {
        async fn read(&mut self) -> Result<Option<RawFrame>, TransportError> {
            if self.shared.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            tokio::select! {
                frame = self.rx.recv() => Ok(frame),
                _ = self.shared.close_wake.notified() => Ok(None),
            }
        }

        fn close_code(&self) -> Option<u16> {
            self.close_code
        }
    }

    #[async_trait]
    impl FrameSink for MemorySink {
        async fn write(&mut self, text: &str) -> Result<(), TransportError> {
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            if self.shared.fail_writes.load(Ordering::SeqCst) {
                return Err(TransportError::Write("broken pipe".to_string()));
            }
            self.tx
                .send(Sent::Text(text.to_string()))
                .map_err(|_| TransportError::Write("peer dropped".to_string()))
        }

        async fn close(&mut self, code: u16) -> Result<(), TransportError> {
            if self.shared.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let _ = self.tx.send(Sent::Close(code));
            self.shared.close_wake.notify_one();
            Ok(())
        }
    }
}
