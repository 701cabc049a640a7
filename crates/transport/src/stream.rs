//! The durable streaming connection to the platform.
//!
//! One background task owns the websocket: it forwards outbound frames,
//! answers Engine.IO pings, and queues inbound events for the dispatcher,
//! which runs as its own task so slow handlers never stall the socket.
//! Nothing here reconnects; a dropped stream is reported through
//! [`StreamClient::run_until_closed`] and the caller decides what to do.

use std::sync::Arc;
use std::time::Duration;

use agora_core::{Emission, TransportError};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::dispatch::{EventDispatcher, EventHandler, FailureReporter, InboundEvent};
use crate::engineio::{OpenInfo, Packet, socket_url};

/// Why a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `disconnect()` was called on this side
    Local,
    /// The platform closed the connection
    Remote,
    /// The connection failed
    Error(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("closed locally"),
            Self::Remote => f.write_str("closed by platform"),
            Self::Error(e) => write!(f, "transport error: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamState {
    Open,
    Closed(CloseReason),
}

/// How [`StreamClient::run_until_closed`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The cancellation token fired first; the stream may still be open
    Cancelled,
    /// The stream closed
    Closed(CloseReason),
}

struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    state: watch::Receiver<StreamState>,
    shutdown: CancellationToken,
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.outbound.is_closed() && *self.state.borrow() == StreamState::Open
    }
}

/// Socket.IO client bound to one platform.
pub struct StreamClient {
    url: String,
    connect_timeout: Duration,
    dispatcher: Arc<EventDispatcher>,
    connection: Mutex<Option<Connection>>,
    connecting: tokio::sync::Mutex<()>,
}

impl StreamClient {
    /// `base_url` is the platform's HTTP address; the websocket endpoint is derived from it.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Self {
        Self {
            url: socket_url(base_url),
            connect_timeout,
            dispatcher: Arc::new(EventDispatcher::new()),
            connection: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Register the handler for `topic`; a later call for the same topic replaces it.
    pub fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.dispatcher.subscribe(topic, handler);
    }

    pub fn on_handler_error(&self, reporter: FailureReporter) {
        self.dispatcher.set_failure_reporter(reporter);
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().as_ref().is_some_and(Connection::is_open)
    }

    /// Open the stream. Returns immediately if it is already open.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let _guard = self.connecting.lock().await;
        if self.is_connected() {
            debug!("Stream already connected");
            return Ok(());
        }

        debug!(url = %self.url, "Opening stream");
        let (ws, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| TransportError::Network("timed out opening stream".into()))?
        .map_err(|e| TransportError::Network(e.to_string()))?;

        let (mut sink, mut source) = ws.split();

        let open = tokio::time::timeout(self.connect_timeout, handshake(&mut sink, &mut source))
            .await
            .map_err(|_| TransportError::Handshake("timed out waiting for platform".into()))??;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(StreamState::Open);
        let shutdown = CancellationToken::new();

        let dispatch = tokio::spawn(self.dispatcher.clone().run(inbound_rx));
        tokio::spawn(pump(
            Pump {
                sink,
                source,
                outbound: outbound_rx,
                inbound: inbound_tx,
                shutdown: shutdown.clone(),
                silence_limit: open.silence_limit(),
                state: state_tx,
            },
            dispatch,
        ));

        *self.connection.lock() = Some(Connection {
            outbound: outbound_tx,
            state: state_rx,
            shutdown,
        });

        info!(sid = %open.sid, "Stream connected");
        Ok(())
    }

    /// Send a fire-and-forget event. Fails if the stream is not open.
    pub fn emit(&self, topic: &str, payload: Value) -> Result<(), TransportError> {
        let frame = Packet::event(topic, payload).encode();
        let guard = self.connection.lock();
        let conn = guard
            .as_ref()
            .filter(|c| c.is_open())
            .ok_or(TransportError::NotConnected)?;
        conn.outbound
            .send(frame)
            .map_err(|_| TransportError::NotConnected)?;
        trace!(topic, "Emitted");
        Ok(())
    }

    /// Emit a typed payload on its fixed topic.
    pub fn emit_typed<E: Emission>(&self, payload: &E) -> Result<(), TransportError> {
        let value =
            serde_json::to_value(payload).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.emit(E::TOPIC, value)
    }

    /// Close the stream. Safe to call repeatedly or when never connected.
    pub fn disconnect(&self) {
        if let Some(conn) = self.connection.lock().take() {
            conn.shutdown.cancel();
            info!("Stream disconnect requested");
        }
    }

    /// Close the stream and wait for the pump to finish.
    ///
    /// Returns once `41` has been sent, the socket is closed and queued
    /// events are dispatched, or after the connect timeout. Must not be
    /// awaited from inside a topic handler.
    pub async fn close(&self) {
        let Some(mut conn) = self.connection.lock().take() else {
            return;
        };
        conn.shutdown.cancel();
        info!("Stream close requested");
        if tokio::time::timeout(self.connect_timeout, wait_closed(&mut conn.state))
            .await
            .is_err()
        {
            warn!("Stream did not close in time");
        }
    }

    /// Block until the stream closes or `cancel` fires.
    pub async fn run_until_closed(
        &self,
        cancel: &CancellationToken,
    ) -> Result<StreamEnd, TransportError> {
        let mut state = self
            .connection
            .lock()
            .as_ref()
            .map(|c| c.state.clone())
            .ok_or(TransportError::NotConnected)?;

        tokio::select! {
            _ = cancel.cancelled() => Ok(StreamEnd::Cancelled),
            reason = wait_closed(&mut state) => Ok(StreamEnd::Closed(reason)),
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn wait_closed(state: &mut watch::Receiver<StreamState>) -> CloseReason {
    loop {
        if let StreamState::Closed(reason) = &*state.borrow_and_update() {
            return reason.clone();
        }
        if state.changed().await.is_err() {
            return match &*state.borrow() {
                StreamState::Closed(reason) => reason.clone(),
                StreamState::Open => CloseReason::Error("stream task ended unexpectedly".into()),
            };
        }
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, WsMessage>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Read the Engine.IO open packet, then join the default namespace.
async fn handshake(sink: &mut WsSink, source: &mut WsSource) -> Result<OpenInfo, TransportError> {
    let first = next_text(source).await?;
    let open = match Packet::decode(&first).map_err(as_handshake)? {
        Packet::Open(info) => info,
        other => {
            return Err(TransportError::Handshake(format!(
                "expected open packet, got {other:?}"
            )));
        }
    };

    send_frame(sink, Packet::Connect(None).encode())
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    loop {
        let frame = next_text(source).await?;
        match Packet::decode(&frame).map_err(as_handshake)? {
            Packet::Connect(_) => break,
            Packet::ConnectError(message) => return Err(TransportError::Handshake(message)),
            Packet::Ping => send_frame(sink, Packet::Pong.encode())
                .await
                .map_err(|e| TransportError::Handshake(e.to_string()))?,
            other => trace!(?other, "Ignoring frame during handshake"),
        }
    }

    Ok(open)
}

fn as_handshake(err: TransportError) -> TransportError {
    TransportError::Handshake(err.to_string())
}

async fn next_text(source: &mut WsSource) -> Result<String, TransportError> {
    loop {
        match source.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(text.as_str().to_string()),
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(TransportError::Handshake("closed during handshake".into()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
        }
    }
}

async fn send_frame(
    sink: &mut WsSink,
    frame: String,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    sink.send(WsMessage::text(frame)).await
}

struct Pump {
    sink: WsSink,
    source: WsSource,
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    shutdown: CancellationToken,
    silence_limit: Duration,
    state: watch::Sender<StreamState>,
}

async fn pump(mut p: Pump, dispatch: JoinHandle<()>) {
    let silence = tokio::time::sleep(p.silence_limit);
    tokio::pin!(silence);

    let reason = loop {
        tokio::select! {
            _ = p.shutdown.cancelled() => {
                let _ = send_frame(&mut p.sink, Packet::Disconnect.encode()).await;
                let _ = p.sink.close().await;
                break CloseReason::Local;
            }
            Some(frame) = p.outbound.recv() => {
                if let Err(e) = send_frame(&mut p.sink, frame).await {
                    break CloseReason::Error(e.to_string());
                }
            }
            () = &mut silence => {
                warn!(limit_ms = p.silence_limit.as_millis() as u64, "No ping from platform");
                break CloseReason::Error("ping timeout".into());
            }
            incoming = p.source.next() => {
                silence.as_mut().reset(Instant::now() + p.silence_limit);
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => break CloseReason::Remote,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break CloseReason::Error(e.to_string()),
                };
                match Packet::decode(text.as_str()) {
                    Ok(Packet::Ping) => {
                        if let Err(e) = send_frame(&mut p.sink, Packet::Pong.encode()).await {
                            break CloseReason::Error(e.to_string());
                        }
                    }
                    Ok(Packet::Event { topic, payload }) => {
                        trace!(topic = %topic, "Received event");
                        let _ = p.inbound.send(InboundEvent { topic, payload });
                    }
                    Ok(Packet::Disconnect) | Ok(Packet::Close) => break CloseReason::Remote,
                    Ok(Packet::ConnectError(message)) => break CloseReason::Error(message),
                    Ok(other) => trace!(?other, "Ignoring frame"),
                    Err(e) => warn!(error = %e, "Dropping malformed frame"),
                }
            }
        }
    };

    // Refuse further emits, then let queued events finish before reporting closure.
    drop(p.outbound);
    drop(p.inbound);
    let _ = dispatch.await;

    info!(reason = %reason, "Stream closed");
    let _ = p.state.send(StreamState::Closed(reason));
}
