//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The socket is split into independently locked read and write halves so
//! a task pushing server messages never waits behind a task parked in
//! `recv`.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Frame, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream))
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(TransportError::io(
                    ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::from_stream(id, ws))
    }
}

/// A single WebSocket connection, server- or client-side.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    open: AtomicBool,
}

impl WebSocketConnection {
    /// Opens a client connection to `url` (e.g. `ws://127.0.0.1:8763`).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| {
                TransportError::ConnectFailed(TransportError::io(
                    ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, url, "opened WebSocket connection");
        Ok(Self::from_stream(id, ws))
    }

    fn from_stream(id: ConnectionId, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            open: AtomicBool::new(true),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        let text = String::from_utf8(data.to_vec()).map_err(|e| {
            TransportError::SendFailed(TransportError::io(
                ErrorKind::InvalidData,
                e,
            ))
        })?;

        self.sink
            .lock()
            .await
            .send(Message::text(text))
            .await
            .map_err(|e| {
                self.open.store(false, Ordering::SeqCst);
                TransportError::SendFailed(TransportError::io(
                    ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::last(text.as_bytes())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::last(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.open.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    self.open.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(
                        TransportError::io(ErrorKind::ConnectionReset, e),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        match self.sink.lock().await.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(TransportError::io(
                ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
