//! WebSocket driver
//!
//! Layered bottom-up:
//! - **transport**: a message-framed duplex channel ([`transport::Connector`])
//! - **mux**: request ids, pending-request correlation, per-call timeouts
//! - **reconnect**: redials and re-authenticates after a transport failure
//! - **client**: the typed API ([`TsdbClient`])
//!
//! Control requests are JSON text frames; raw blocks and stmt2 binds are
//! binary frames behind a 24-byte `req_id, object_id, message_kind` prefix.

pub mod client;
pub mod mux;
pub mod protocol;
pub mod reconnect;
pub mod transport;

pub use client::{QueryResult, RawBlockResult, Stmt2, TsdbClient, TsdbClientBuilder};
pub use mux::{ConnectionState, MuxConfig, Multiplexer, Request};
pub use reconnect::{Handshake, ReconnectManager, ReconnectPolicy};
pub use transport::{Connector, Frame, Transport, WsConnector};
