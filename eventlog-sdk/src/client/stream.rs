//! WebSocket client for the ingest stream (`GET /ws`).

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::{Acknowledgment, InboundEvent};

/// A single WebSocket session with the ingest endpoint.
///
/// The server answers every frame in order, so [`send_event`] simply
/// waits for the next text frame after sending.
///
/// [`send_event`]: EventStreamClient::send_event
pub struct EventStreamClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventStreamClient {
    /// Connect to a `ws://` or `wss://` endpoint, e.g. `ws://127.0.0.1:8000/ws`.
    pub async fn connect(url: &Url) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url.as_str()).await?;
        Ok(Self { stream })
    }

    /// Send one event and wait for its acknowledgment.
    pub async fn send_event(&mut self, event: &InboundEvent) -> Result<Acknowledgment, ClientError> {
        let json = serde_json::to_string(event)?;
        self.send_raw(json).await
    }

    /// Send an arbitrary text frame and wait for the acknowledgment.
    ///
    /// Useful for exercising the server's handling of malformed input.
    pub async fn send_raw(&mut self, text: impl Into<String>) -> Result<Acknowledgment, ClientError> {
        let text: String = text.into();
        self.stream.send(Message::Text(text.into())).await?;
        let reply = self.next_text().await?;
        Ok(serde_json::from_str(&reply)?)
    }

    /// Send a binary frame and wait for the acknowledgment.
    pub async fn send_binary(&mut self, payload: Vec<u8>) -> Result<Acknowledgment, ClientError> {
        self.stream.send(Message::Binary(payload.into())).await?;
        let reply = self.next_text().await?;
        Ok(serde_json::from_str(&reply)?)
    }

    /// Send a ping frame without waiting for anything in return.
    pub async fn ping(&mut self, payload: Vec<u8>) -> Result<(), ClientError> {
        self.stream.send(Message::Ping(payload.into())).await?;
        Ok(())
    }

    /// Wait for the next text frame from the server.
    ///
    /// Control frames are skipped; a close frame or end of stream yields
    /// [`ClientError::ConnectionClosed`].
    pub async fn next_text(&mut self) -> Result<String, ClientError> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Close(_) => return Err(ClientError::ConnectionClosed),
                _ => continue,
            }
        }
        Err(ClientError::ConnectionClosed)
    }

    /// Send a normal close frame and drain the server's reply.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        while let Some(message) = self.stream.next().await {
            if message.is_err() {
                break;
            }
        }
        Ok(())
    }
}
