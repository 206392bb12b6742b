//! Test WebSocket client.
//!
//! Sends JSON frames and asserts on received frames and close codes.

use cipher_proto::CloseReason;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// What the server sent next.
#[derive(Debug)]
pub enum Received {
    Frame(Value),
    Closed(Option<u16>),
}

/// A test session client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Open a WebSocket to `url`.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Self { ws })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(WsMessage::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a chat frame.
    pub async fn send_chat(&mut self, to: &str, content: &str) -> anyhow::Result<()> {
        let frame = json!({ "type": "message", "receiverId": to, "content": content });
        self.send_raw(&frame.to_string()).await
    }

    /// Ask for a presence snapshot.
    #[allow(dead_code)]
    pub async fn request_presence(&mut self) -> anyhow::Result<()> {
        self.send_raw(r#"{"type":"presence"}"#).await
    }

    /// Receive the next frame or close.
    pub async fn recv(&mut self) -> anyhow::Result<Received> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive with a timeout, skipping pings and pongs.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Received> {
        loop {
            let next = timeout(dur, self.ws.next()).await?;
            match next {
                None => return Ok(Received::Closed(None)),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(WsMessage::Text(text))) => {
                    return Ok(Received::Frame(serde_json::from_str(&text)?));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return Ok(Received::Closed(frame.map(|f| u16::from(f.code))));
                }
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Receive the next frame and require its `type`.
    pub async fn expect_frame(&mut self, kind: &str) -> anyhow::Result<Value> {
        match self.recv().await? {
            Received::Frame(frame) if frame["type"] == kind => Ok(frame),
            other => anyhow::bail!("expected {kind} frame, got {other:?}"),
        }
    }

    /// Receive the next item and require a close for `reason`.
    #[allow(dead_code)]
    pub async fn expect_close(&mut self, reason: CloseReason) -> anyhow::Result<()> {
        match self.recv().await? {
            Received::Closed(Some(code)) if CloseReason::from_code(code) == Some(reason) => Ok(()),
            other => anyhow::bail!("expected close {reason}, got {other:?}"),
        }
    }

    /// Require that nothing arrives for `dur`.
    #[allow(dead_code)]
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Err(e) if e.is::<tokio::time::error::Elapsed>() => Ok(()),
            Err(e) => Err(e),
            Ok(received) => anyhow::bail!("expected silence, got {received:?}"),
        }
    }

    /// Close the session cleanly.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
