//! Message-framed duplex channel the multiplexer runs on.
//!
//! The multiplexer only needs "send one message, receive one message,
//! notice close or error", so the seam is a boxed sink and stream of
//! [`Frame`]s produced by a [`Connector`].

mod ws;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, Stream};

use crate::error::{DriverError, DriverResult};

pub use ws::WsConnector;

/// One discrete transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = DriverError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = DriverResult<Frame>> + Send>>;

/// An established connection, split into its write and read halves.
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Dials new transports; called once up front and again on every reconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> DriverResult<Transport>;
}
