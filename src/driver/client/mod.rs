//! Time-series database client over the WebSocket protocol.
//!
//! Every call goes through one shared, multiplexed connection, so a
//! [`TsdbClient`] is cheap to clone and safe to use from many tasks.

mod builder;
mod query;
mod raw;
mod stmt2;

pub use builder::TsdbClientBuilder;
pub use query::{QueryResult, RawBlockResult};
pub use stmt2::Stmt2;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::mux::Request;
use super::protocol::{codec, Action, VersionResp};
use super::reconnect::ReconnectManager;
use super::transport::{Connector, Frame, WsConnector};
use crate::config::ClientConfig;
use crate::error::{DriverError, DriverResult};
use crate::stmt2::Stmt2Framer;

struct ClientInner {
    manager: Arc<ReconnectManager>,
    framer: Stmt2Framer,
}

#[derive(Clone)]
pub struct TsdbClient {
    inner: Arc<ClientInner>,
}

impl TsdbClient {
    pub fn builder(url: &str) -> TsdbClientBuilder {
        TsdbClientBuilder::new(url)
    }

    /// Connects to `config.url` over WebSocket and authenticates.
    pub async fn connect(config: &ClientConfig) -> DriverResult<Self> {
        let connector = WsConnector::new(&config.url, config.connect_timeout())?;
        Self::with_connector(Arc::new(connector), config).await
    }

    /// Like [`TsdbClient::connect`] but dials through `connector`.
    pub async fn with_connector(connector: Arc<dyn Connector>, config: &ClientConfig) -> DriverResult<Self> {
        Self::with_framer(connector, config, Stmt2Framer::new(config.stmt2_layout.layout())).await
    }

    pub(crate) async fn with_framer(
        connector: Arc<dyn Connector>,
        config: &ClientConfig,
        framer: Stmt2Framer,
    ) -> DriverResult<Self> {
        let manager = ReconnectManager::connect(
            connector,
            config.mux_config(),
            config.reconnect.policy(),
            config.handshake(),
        )
        .await?;
        Ok(Self {
            inner: Arc::new(ClientInner { manager, framer }),
        })
    }

    pub(crate) fn framer(&self) -> Stmt2Framer {
        self.inner.framer
    }

    /// Sends `request` and decodes its JSON reply.
    pub(crate) async fn call<T: DeserializeOwned>(&self, request: impl Into<Request>) -> DriverResult<T> {
        let frame = self.inner.manager.send(request).await?;
        decode_text(frame)
    }

    pub(crate) async fn call_frame(&self, request: impl Into<Request>) -> DriverResult<Frame> {
        self.inner.manager.send(request).await
    }

    pub(crate) async fn post(&self, request: impl Into<Request>) -> DriverResult<()> {
        self.inner.manager.post(request).await
    }

    /// Server version string.
    pub async fn version(&self) -> DriverResult<String> {
        let resp: VersionResp = self.call(Action::Version).await?;
        Ok(resp.version)
    }

    /// True once the connection is gone for good.
    pub fn is_closed(&self) -> bool {
        self.inner.manager.is_closed()
    }

    /// Drains and closes the shared connection for every clone.
    pub async fn close(&self) {
        self.inner.manager.close().await;
    }
}

pub(crate) fn decode_text<T: DeserializeOwned>(frame: Frame) -> DriverResult<T> {
    match frame {
        Frame::Text(text) => codec::decode_response(&text),
        Frame::Binary(_) => Err(DriverError::Decode("expected a text reply, got binary".to_string())),
        other => Err(DriverError::Decode(format!("unexpected reply frame: {:?}", other))),
    }
}
