use std::time::Duration;

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use super::{Connector, Frame, Transport};
use crate::error::{DriverError, DriverResult};

const WS_PATH: &str = "ws";

/// Dials the server's WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    connect_timeout: Duration,
}

impl WsConnector {
    /// `base` is `ws://host:port` or `wss://host:port`; the `/ws` path is
    /// appended when missing.
    pub fn new(base: &str, connect_timeout: Duration) -> DriverResult<Self> {
        let mut url = Url::parse(base).map_err(|e| DriverError::Config(format!("Invalid url {}: {}", base, e)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            "http" => set_scheme(&mut url, "ws")?,
            "https" => set_scheme(&mut url, "wss")?,
            other => return Err(DriverError::Config(format!("Unsupported scheme: {}", other))),
        }
        if url.path().trim_matches('/').is_empty() {
            url.set_path(WS_PATH);
        }
        Ok(Self { url, connect_timeout })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn set_scheme(url: &mut Url, scheme: &str) -> DriverResult<()> {
    url.set_scheme(scheme)
        .map_err(|_| DriverError::Config(format!("Cannot switch {} to {}", url, scheme)))
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.to_string())),
        Message::Binary(data) => Some(Frame::Binary(data)),
        Message::Ping(data) => Some(Frame::Ping(data)),
        Message::Pong(data) => Some(Frame::Pong(data)),
        Message::Close(_) => Some(Frame::Close),
        Message::Frame(_) => None,
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> DriverResult<Transport> {
        tracing::debug!(url = %self.url, "connecting");
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| {
                DriverError::Transport(format!(
                    "Connecting to {} timed out after {:?}",
                    self.url, self.connect_timeout
                ))
            })??;
        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(DriverError::from)
            .with(|frame: Frame| future::ready(Ok::<_, DriverError>(into_message(frame))));
        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(message) => from_message(message).map(Ok),
                Err(e) => Some(Err(DriverError::from(e))),
            })
        });
        Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
    }
}
