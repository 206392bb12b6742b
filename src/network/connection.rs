//! Connection - drives one WebSocket client through its session.
//!
//! Each Connection runs in its own Tokio task, with a dedicated writer task:
//!
//! ```text
//!    ┌──────────────┐   frames    ┌────────────────┐
//!    │ reader loop  │ ──────────▶ │ SessionManager │
//!    └──────────────┘             └───────┬────────┘
//!                                         │ Outbound (bounded mpsc)
//!    ┌──────────────┐                     ▼
//!    │ writer task  │ ◀──────── own replies + forwards from other sessions
//!    └──────────────┘
//! ```
//!
//! Frames from one connection are handled sequentially, in arrival order.

use cipher_proto::FrameError;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{Instrument, debug, info, instrument};

use crate::error::SessionError;
use crate::session::{DisconnectReason, SessionManager};
use crate::state::Outbound;
use crate::telemetry::spans;

/// Per-connection settings taken from the config.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Capacity of the outbound queue.
    pub outbound_queue: usize,
    /// Close the session after this long without an inbound frame.
    pub idle_timeout: Option<Duration>,
    /// Hard cap on an inbound message; larger ones break the connection.
    pub max_message_bytes: usize,
}

/// A client connection handler.
pub struct Connection<S> {
    user_id: String,
    addr: SocketAddr,
    ws: WebSocketStream<S>,
    manager: Arc<SessionManager>,
    settings: ConnectionSettings,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create a handler for an upgraded WebSocket.
    pub fn new(
        user_id: String,
        addr: SocketAddr,
        ws: WebSocketStream<S>,
        manager: Arc<SessionManager>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            user_id,
            addr,
            ws,
            manager,
            settings,
        }
    }

    /// Run the session until the client leaves, the transport fails, or the
    /// handshake is refused.
    #[instrument(skip(self), fields(user_id = %self.user_id), name = "websocket")]
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            user_id,
            addr,
            ws,
            manager,
            settings,
        } = self;

        let (sink, mut stream) = ws.split();
        let (tx, rx) = mpsc::channel(settings.outbound_queue);
        let writer = tokio::spawn(write_loop(sink, rx).in_current_span());

        let mut session = manager.begin(user_id, tx);
        if let Err(e) = manager.open(&mut session).await {
            // Any close frame is already queued; dropping the session lets the
            // writer drain it and exit.
            drop(session);
            let _ = writer.await;
            info!(%addr, error = %e, "Handshake refused");
            return match e {
                SessionError::Unauthorized(_) => Ok(()),
                other => Err(other.into()),
            };
        }

        let span = spans::session(session.user_id(), &session.id().to_string());
        let reason = async {
            loop {
                let next = match settings.idle_timeout {
                    Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                        Ok(next) => next,
                        Err(_) => break DisconnectReason::IdleTimeout,
                    },
                    None => stream.next().await,
                };

                let result = match next {
                    None => break DisconnectReason::ClientClosed,
                    Some(Err(e)) => break DisconnectReason::TransportError(e.to_string()),
                    Some(Ok(WsMessage::Text(text))) => {
                        manager.handle_frame(&mut session, &text).await
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        manager.reject_frame(&session, FrameError::NotText).await
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!(?frame, "Client sent close");
                        break DisconnectReason::ClientClosed;
                    }
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => Ok(()),
                };

                if let Err(e) = result {
                    break DisconnectReason::TransportError(e.to_string());
                }
            }
        }
        .instrument(span)
        .await;

        manager.close(&mut session, reason).await;
        drop(session);
        let _ = writer.await;
        Ok(())
    }
}

/// Drain the outbound queue into the WebSocket sink.
///
/// Stops after a close frame, on a write error, or when every sender is gone.
async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, WsMessage>,
    mut rx: mpsc::Receiver<Outbound>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Frame(frame) => {
                if let Err(e) = sink.send(WsMessage::Text(frame.to_json())).await {
                    debug!(error = %e, "Write failed");
                    return;
                }
            }
            Outbound::Close(reason) => {
                info!(code = reason.code(), reason = reason.reason(), "Closing connection");
                let frame = CloseFrame {
                    code: CloseCode::from(reason.code()),
                    reason: reason.reason().into(),
                };
                if let Err(e) = sink.send(WsMessage::Close(Some(frame))).await {
                    debug!(error = %e, "Close frame not sent");
                }
                return;
            }
        }
    }
    let _ = sink.close().await;
}
