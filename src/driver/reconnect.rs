//! Keeps a session alive across transport failures.
//!
//! A supervisor task watches the active [`Multiplexer`]. When it closes
//! without the user asking, the supervisor redials with a fixed delay
//! between attempts, replays the `conn` handshake and swaps the new
//! multiplexer in. Requests that were pending on the old connection are
//! not replayed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::mux::{MuxConfig, Multiplexer, Request};
use super::protocol::{codec, Action, BaseResponse};
use super::transport::{Connector, Frame};
use crate::error::{DriverError, DriverResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub retries: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            retries: 3,
            interval: Duration::from_secs(2),
        }
    }
}

/// Credentials replayed on every (re)connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl Handshake {
    fn action(&self) -> Action {
        Action::Conn {
            user: self.user.clone(),
            password: self.password.clone(),
            db: self.database.clone(),
        }
    }
}

#[derive(Clone)]
enum SessionState {
    Active(Arc<Multiplexer>),
    Reconnecting,
    Closed,
}

pub struct ReconnectManager {
    connector: Arc<dyn Connector>,
    mux_config: MuxConfig,
    policy: ReconnectPolicy,
    handshake: Handshake,
    state: watch::Sender<SessionState>,
    closing: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectManager {
    /// Dials and authenticates once; a failure here is returned directly
    /// and never retried.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        mux_config: MuxConfig,
        policy: ReconnectPolicy,
        handshake: Handshake,
    ) -> DriverResult<Arc<Self>> {
        let mux = dial(connector.as_ref(), &mux_config, &handshake).await?;
        let (state, _) = watch::channel(SessionState::Active(mux.clone()));
        let manager = Arc::new(Self {
            connector,
            mux_config,
            policy,
            handshake,
            state,
            closing: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        });
        let handle = tokio::spawn(supervise(Arc::downgrade(&manager), mux));
        *manager.supervisor.lock() = Some(handle);
        Ok(manager)
    }

    pub fn request_timeout(&self) -> Duration {
        self.mux_config.request_timeout
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Closed)
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Reconnecting)
    }

    /// The active multiplexer, waiting up to `wait` while a reconnect is in
    /// progress.
    pub async fn current(&self, wait: Duration) -> DriverResult<Arc<Multiplexer>> {
        let mut rx = self.state.subscribe();
        let settled = tokio::time::timeout(
            wait,
            rx.wait_for(|state| !matches!(state, SessionState::Reconnecting)),
        )
        .await;
        match settled {
            Ok(Ok(state)) => match &*state {
                SessionState::Active(mux) => Ok(mux.clone()),
                _ => Err(DriverError::Closed),
            },
            Ok(Err(_)) => Err(DriverError::Closed),
            Err(_) => Err(DriverError::Transport(format!(
                "still reconnecting after {:?}",
                wait
            ))),
        }
    }

    /// Sends on the active connection within the request timeout, counting
    /// any time spent waiting for a reconnect.
    pub async fn send(&self, request: impl Into<Request>) -> DriverResult<Frame> {
        let budget = self.mux_config.request_timeout;
        let started = Instant::now();
        let mux = self.current(budget).await?;
        let remaining = budget.saturating_sub(started.elapsed());
        mux.send_with_timeout(request.into(), remaining).await
    }

    pub async fn post(&self, request: impl Into<Request>) -> DriverResult<()> {
        let mux = self.current(self.mux_config.request_timeout).await?;
        mux.post(request).await
    }

    /// Closes the session for good; later calls fail with
    /// [`DriverError::Closed`].
    pub async fn close(&self) {
        self.closing.store(true, Ordering::Release);
        let previous = self.state.send_replace(SessionState::Closed);
        if let SessionState::Active(mux) = previous {
            mux.close().await;
        }
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }

    async fn reconnect(&self) -> Option<Arc<Multiplexer>> {
        for attempt in 1..=self.policy.retries {
            tokio::time::sleep(self.policy.interval).await;
            if self.closing.load(Ordering::Acquire) {
                return None;
            }
            tracing::warn!(attempt, retries = self.policy.retries, "reconnecting");
            match dial(self.connector.as_ref(), &self.mux_config, &self.handshake).await {
                Ok(mux) => {
                    tracing::info!(attempt, "reconnected");
                    return Some(mux);
                }
                Err(err) => tracing::warn!(attempt, error = %err, "reconnect attempt failed"),
            }
        }
        None
    }
}

async fn dial(
    connector: &dyn Connector,
    config: &MuxConfig,
    handshake: &Handshake,
) -> DriverResult<Arc<Multiplexer>> {
    let transport = connector.connect().await?;
    let mux = Multiplexer::start(transport, config.clone());
    let reply = mux.send(handshake.action()).await?;
    let Frame::Text(text) = reply else {
        return Err(DriverError::Decode("conn reply is not a text frame".to_string()));
    };
    codec::decode_response::<BaseResponse>(&text)?;
    tracing::debug!(user = %handshake.user, db = ?handshake.database, "connection established");
    Ok(mux)
}

async fn supervise(manager: Weak<ReconnectManager>, mut mux: Arc<Multiplexer>) {
    loop {
        mux.wait_closed().await;
        let Some(this) = manager.upgrade() else {
            return;
        };
        if mux.closed_by_user() || this.closing.load(Ordering::Acquire) {
            this.state.send_replace(SessionState::Closed);
            return;
        }
        if !this.policy.enabled {
            tracing::warn!("connection lost and reconnect is disabled");
            this.state.send_replace(SessionState::Closed);
            return;
        }

        this.state.send_replace(SessionState::Reconnecting);
        match this.reconnect().await {
            Some(next) => {
                let swapped = this.state.send_if_modified(|state| {
                    if matches!(state, SessionState::Closed) {
                        return false;
                    }
                    *state = SessionState::Active(next.clone());
                    true
                });
                if !swapped {
                    next.close().await;
                    return;
                }
                mux = next;
            }
            None => {
                tracing::warn!(retries = this.policy.retries, "giving up on reconnect");
                this.state.send_replace(SessionState::Closed);
                return;
            }
        }
    }
}
