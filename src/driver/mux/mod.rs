//! Request/response correlation over one persistent connection.
//!
//! Callers enqueue frames for a single writer task and park on a private
//! oneshot channel. A single reader task owns the read half, pulls the
//! request id out of every inbound frame and hands it to the matching
//! caller. Responses may arrive in any order.

mod pending;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::protocol::{binary, codec, Action, BinaryRequest};
use super::transport::{Frame, FrameSink, FrameStream, Transport};
use crate::error::{DriverError, DriverResult};
use pending::PendingList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Draining,
    Closed,
}

#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub request_timeout: Duration,
    /// Ping after this long without a write; `None` disables keepalive.
    pub keepalive: Option<Duration>,
    pub queue_depth: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            keepalive: Some(Duration::from_secs(30)),
            queue_depth: 64,
        }
    }
}

/// Something the multiplexer can correlate.
#[derive(Debug, Clone)]
pub enum Request {
    Json(Action),
    Binary(BinaryRequest),
}

impl Request {
    fn into_frame(self, req_id: u64) -> DriverResult<Frame> {
        match self {
            Request::Json(action) => Ok(Frame::Text(codec::encode_request(&action, req_id)?)),
            Request::Binary(mut request) => {
                request.set_req_id(req_id);
                Ok(Frame::Binary(request.into_bytes()))
            }
        }
    }
}

impl From<Action> for Request {
    fn from(action: Action) -> Self {
        Request::Json(action)
    }
}

impl From<BinaryRequest> for Request {
    fn from(request: BinaryRequest) -> Self {
        Request::Binary(request)
    }
}

struct Shared {
    next_req_id: AtomicU64,
    pending: Mutex<PendingList>,
    state: watch::Sender<ConnectionState>,
    closed_by_user: AtomicBool,
}

impl Shared {
    fn dispatch(&self, req_id: Option<u64>, frame: Frame) {
        let Some(req_id) = req_id else {
            tracing::warn!("dropping response without a request id");
            return;
        };
        let tx = self.pending.lock().take(req_id);
        match tx {
            Some(tx) => {
                tracing::trace!(req_id, "dispatching response");
                let _ = tx.send(Ok(frame));
            }
            None => tracing::warn!(req_id, "dropping response with no pending request"),
        }
    }

    /// Moves to `Closed` and fails everything still pending. Only the first
    /// call has an effect.
    fn shutdown(&self, reason: Option<DriverError>) {
        let changed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                return false;
            }
            *state = ConnectionState::Closed;
            true
        });
        if !changed {
            return;
        }
        let failed = match &reason {
            Some(err) => {
                tracing::warn!(error = %err, "connection failed");
                let message = err.to_string();
                self.pending
                    .lock()
                    .fail_all(|| DriverError::Transport(message.clone()))
            }
            None => self.pending.lock().fail_all(|| DriverError::Closed),
        };
        if failed > 0 {
            tracing::debug!(failed, "abandoned pending requests");
        }
    }
}

/// Shares one transport between any number of concurrent callers.
pub struct Multiplexer {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Frame>,
    config: MuxConfig,
}

impl Multiplexer {
    /// Spawns the reader and writer tasks for `transport`. Must be called
    /// inside a tokio runtime.
    pub fn start(transport: Transport, config: MuxConfig) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            next_req_id: AtomicU64::new(0),
            pending: Mutex::new(PendingList::default()),
            state,
            closed_by_user: AtomicBool::new(false),
        });
        let (outbound, queue) = mpsc::channel(config.queue_depth.max(1));

        tokio::spawn(write_loop(shared.clone(), transport.sink, queue, config.keepalive));
        tokio::spawn(read_loop(shared.clone(), transport.stream, outbound.clone()));

        shared.state.send_if_modified(|state| {
            if *state != ConnectionState::Connecting {
                return false;
            }
            *state = ConnectionState::Ready;
            true
        });
        Arc::new(Self {
            shared,
            outbound,
            config,
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Resolves once the connection has reached `Closed`.
    pub async fn wait_closed(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
    }

    /// True when the connection was shut down through [`Multiplexer::close`].
    pub fn closed_by_user(&self) -> bool {
        self.shared.closed_by_user.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    fn next_req_id(&self) -> u64 {
        self.shared.next_req_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Sends `request` and waits for the correlated response using the
    /// configured request timeout.
    pub async fn send(&self, request: impl Into<Request>) -> DriverResult<Frame> {
        self.send_with_timeout(request.into(), self.config.request_timeout)
            .await
    }

    pub async fn send_with_timeout(&self, request: Request, timeout: Duration) -> DriverResult<Frame> {
        if self.state() != ConnectionState::Ready {
            return Err(DriverError::Closed);
        }
        let req_id = self.next_req_id();
        let frame = request.into_frame(req_id)?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(req_id, tx);
        // A shutdown that raced the insert has already failed the list.
        if self.state() == ConnectionState::Closed {
            self.shared.pending.lock().remove(req_id);
            return Err(DriverError::Closed);
        }

        let exchange = async {
            if self.outbound.send(frame).await.is_err() {
                return Err(DriverError::Closed);
            }
            rx.await.unwrap_or(Err(DriverError::Closed))
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(err)) => {
                self.shared.pending.lock().remove(req_id);
                Err(err)
            }
            Err(_) => {
                self.shared.pending.lock().remove(req_id);
                tracing::debug!(req_id, ?timeout, "request timed out");
                Err(DriverError::Timeout { req_id, after: timeout })
            }
        }
    }

    /// Enqueues a request the server never answers. Nothing is registered
    /// as pending.
    pub async fn post(&self, request: impl Into<Request>) -> DriverResult<()> {
        if self.state() != ConnectionState::Ready {
            return Err(DriverError::Closed);
        }
        let frame = request.into().into_frame(self.next_req_id())?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| DriverError::Closed)
    }

    /// Starts a graceful close and waits until the connection is down.
    /// Requests still pending fail with [`DriverError::Closed`].
    pub async fn close(&self) {
        self.shared.closed_by_user.store(true, Ordering::Release);
        self.shared.state.send_if_modified(|state| {
            if *state != ConnectionState::Ready {
                return false;
            }
            *state = ConnectionState::Draining;
            true
        });
        if self.outbound.send(Frame::Close).await.is_err() {
            self.shared.shutdown(None);
            return;
        }
        if tokio::time::timeout(self.config.request_timeout, self.wait_closed())
            .await
            .is_err()
        {
            self.shared.shutdown(None);
        }
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.shared.shutdown(None);
    }
}

async fn wait_for_closed(rx: &mut watch::Receiver<ConnectionState>) {
    let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
}

async fn read_loop(shared: Arc<Shared>, mut stream: FrameStream, outbound: mpsc::Sender<Frame>) {
    let mut state = shared.state.subscribe();
    let reason = loop {
        let next = tokio::select! {
            next = stream.next() => next,
            _ = wait_for_closed(&mut state) => return,
        };
        match next {
            Some(Ok(Frame::Text(text))) => {
                let req_id = codec::peek_req_id(&text);
                shared.dispatch(req_id, Frame::Text(text));
            }
            Some(Ok(Frame::Binary(data))) => {
                let req_id = binary::response_req_id(&data);
                shared.dispatch(req_id, Frame::Binary(data));
            }
            Some(Ok(Frame::Ping(data))) => {
                if outbound.send(Frame::Pong(data)).await.is_err() {
                    tracing::debug!("writer gone, pong not sent");
                }
            }
            Some(Ok(Frame::Pong(_))) => tracing::trace!("pong"),
            Some(Ok(Frame::Close)) => {
                if shared.closed_by_user.load(Ordering::Acquire) {
                    break None;
                }
                break Some(DriverError::Transport("connection closed by server".to_string()));
            }
            Some(Err(err)) => break Some(err),
            None => {
                if shared.closed_by_user.load(Ordering::Acquire) {
                    break None;
                }
                break Some(DriverError::Transport("connection reset".to_string()));
            }
        }
    };
    shared.shutdown(reason);
}

async fn keepalive_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}

async fn write_loop(
    shared: Arc<Shared>,
    mut sink: FrameSink,
    mut queue: mpsc::Receiver<Frame>,
    keepalive: Option<Duration>,
) {
    let mut state = shared.state.subscribe();
    let mut ticker = keepalive.filter(|p| !p.is_zero()).map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut last_write = Instant::now();

    loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                Some(Frame::Close) => {
                    let _ = sink.send(Frame::Close).await;
                    let _ = sink.close().await;
                    return;
                }
                Some(frame) => {
                    if let Err(err) = sink.send(frame).await {
                        shared.shutdown(Some(err));
                        return;
                    }
                    last_write = Instant::now();
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            _ = keepalive_tick(&mut ticker) => {
                let idle = keepalive.unwrap_or_default();
                if last_write.elapsed() >= idle {
                    tracing::trace!("sending keepalive ping");
                    if let Err(err) = sink.send(Frame::Ping(Bytes::new())).await {
                        shared.shutdown(Some(err));
                        return;
                    }
                    last_write = Instant::now();
                }
            }
            _ = wait_for_closed(&mut state) => {
                let _ = sink.close().await;
                return;
            }
        }
    }
}
