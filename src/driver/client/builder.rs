use std::sync::Arc;

use super::TsdbClient;
use crate::config::{ClientConfig, FramerVersion, ReconnectConfig};
use crate::driver::transport::{Connector, WsConnector};
use crate::error::DriverResult;
use crate::stmt2::{Stmt2Framer, Stmt2Layout};

/// Builder for creating a TsdbClient with additional options
pub struct TsdbClientBuilder {
    config: ClientConfig,
    layout: Option<Stmt2Layout>,
    connector: Option<Arc<dyn Connector>>,
}

impl TsdbClientBuilder {
    /// Create a new builder for a `ws://host:port` endpoint
    pub fn new(url: &str) -> Self {
        Self::from_config(ClientConfig {
            url: url.to_string(),
            ..ClientConfig::default()
        })
    }

    /// Start from a loaded configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            layout: None,
            connector: None,
        }
    }

    /// Set authentication credentials
    pub fn auth(mut self, user: &str, password: &str) -> Self {
        self.config.user = user.to_string();
        self.config.password = password.to_string();
        self
    }

    /// Select the default database
    pub fn database(mut self, database: &str) -> Self {
        self.config.database = Some(database.to_string());
        self
    }

    /// Set the per-request timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Ping interval when idle; 0 disables keepalive
    pub fn keepalive_ms(mut self, ms: u64) -> Self {
        self.config.keepalive_ms = ms;
        self
    }

    /// Enable automatic reconnection
    pub fn reconnect(mut self, retries: u32, interval_ms: u64) -> Self {
        self.config.reconnect = ReconnectConfig {
            enabled: true,
            retries,
            interval_ms,
        };
        self
    }

    pub fn stmt2_layout(mut self, version: FramerVersion) -> Self {
        self.config.stmt2_layout = version;
        self.layout = None;
        self
    }

    /// Use an explicit stmt2 layout, e.g. a V2 layout with a custom prefix
    pub fn stmt2_raw_layout(mut self, layout: Stmt2Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Dial through `connector` instead of a WebSocket
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the client
    pub async fn build(self) -> DriverResult<TsdbClient> {
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector::new(
                &self.config.url,
                self.config.connect_timeout(),
            )?),
        };
        let layout = self
            .layout
            .unwrap_or_else(|| self.config.stmt2_layout.layout());
        TsdbClient::with_framer(connector, &self.config, Stmt2Framer::new(layout)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_options() {
        let builder = TsdbClientBuilder::new("ws://db:6041")
            .auth("reader", "secret")
            .database("power")
            .timeout_ms(1500)
            .keepalive_ms(0)
            .reconnect(5, 100)
            .stmt2_layout(FramerVersion::V1);
        let config = builder.config();
        assert_eq!(config.url, "ws://db:6041");
        assert_eq!(config.user, "reader");
        assert_eq!(config.database.as_deref(), Some("power"));
        assert_eq!(config.request_timeout_ms, 1500);
        assert_eq!(config.mux_config().keepalive, None);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.retries, 5);
        assert_eq!(config.stmt2_layout, FramerVersion::V1);
    }
}
