//! One live client socket and everything it owns.
//!
//! A `Connection` holds the outbound half of the socket behind a single
//! write mutex, the control half of its private broker subscription, the
//! set of topics currently subscribed on that handle, and the cancellation
//! scope shared by its read, write and keepalive tasks.
//!
//! Connections are never reused: every upgrade builds a fresh instance and
//! [`Connection::teardown`] is terminal.

use std::borrow::Cow;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::{Sink, SinkExt};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::RealtimeConfig;
use crate::domain::foundation::{ConnectionId, Timestamp, UserId};
use crate::domain::realtime::{
    plan_seed, plan_subscribe, plan_unsubscribe, SubscriptionPlan, Topic, TopicSet,
};
use crate::ports::{BrokerError, SubscriptionControl};

/// Outbound half of a client socket.
pub type OutboundSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Close code sent to a connection superseded by a newer one for the same user.
pub const CLOSE_REPLACED: u16 = 4000;

/// Per-connection liveness and size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// How often a protocol ping is sent.
    pub ping_interval: Duration,
    /// Read deadline, refreshed on every inbound pong.
    pub pong_timeout: Duration,
    /// Upper bound on every outbound write, including close frames.
    pub write_timeout: Duration,
    /// Largest inbound client frame.
    pub max_message_bytes: usize,
}

impl ConnectionSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
            write_timeout: config.write_timeout(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(54),
            pong_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_bytes: 4096,
        }
    }
}

/// Why a connection is being torn down; selects the close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client went away or a task failed.
    Normal,
    /// A newer connection for the same user took over.
    Replaced,
    /// The server is stopping.
    Shutdown,
}

impl CloseReason {
    fn frame(self) -> CloseFrame<'static> {
        let (code, reason) = match self {
            Self::Normal => (close_code::NORMAL, ""),
            Self::Replaced => (CLOSE_REPLACED, "replaced"),
            Self::Shutdown => (close_code::AWAY, "server shutting down"),
        };
        CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        }
    }
}

/// Errors on the connection's write path and broker calls.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Write deadline of {0:?} exceeded")]
    WriteTimeout(Duration),

    #[error("Socket write failed: {0}")]
    Transport(#[from] axum::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Broker call exceeded {0:?}")]
    BrokerTimeout(Duration),

    #[error("Connection is closed")]
    Closed,
}

struct SubscriptionState {
    control: Option<Box<dyn SubscriptionControl>>,
    topics: TopicSet,
}

/// A live client socket with its private broker subscription.
pub struct Connection {
    id: ConnectionId,
    user: UserId,
    connected_at: Timestamp,
    settings: ConnectionSettings,
    outbound: Mutex<OutboundSink>,
    subscriptions: Mutex<SubscriptionState>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(
        user: UserId,
        outbound: OutboundSink,
        control: Box<dyn SubscriptionControl>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            user,
            connected_at: Timestamp::now(),
            settings,
            outbound: Mutex::new(outbound),
            subscriptions: Mutex::new(SubscriptionState {
                control: Some(control),
                topics: TopicSet::new(),
            }),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Cancellation scope shared by the connection's tasks.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the scope without doing teardown I/O. Tasks unwind and the
    /// gateway then unregisters the connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Snapshot of the topics currently subscribed on the broker handle.
    pub async fn topics(&self) -> Vec<Topic> {
        self.subscriptions.lock().await.topics.iter().cloned().collect()
    }

    /// Write one frame through the guarded write path.
    ///
    /// Waiting for the write lock counts against the write deadline.
    pub async fn send(&self, message: Message) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.write(message).await
    }

    async fn write(&self, message: Message) -> Result<(), ConnectionError> {
        let deadline = self.settings.write_timeout;
        tokio::time::timeout(deadline, async {
            let mut sink = self.outbound.lock().await;
            sink.send(message).await
        })
        .await
        .map_err(|_| ConnectionError::WriteTimeout(deadline))??;
        Ok(())
    }

    /// Subscribe the two per-user topics bound to this connection.
    pub async fn seed_fixed_topics(&self) -> Result<(), ConnectionError> {
        let fixed = Topic::fixed_for(&self.user);
        let mut state = self.subscriptions.lock().await;
        let plan = plan_seed(&state.topics, &fixed);
        self.apply(&mut state, plan).await
    }

    /// Make `section_ids` the complete dynamic topic set.
    pub async fn subscribe_sections(&self, section_ids: &[String]) -> Result<(), ConnectionError> {
        let mut state = self.subscriptions.lock().await;
        let plan = plan_subscribe(&state.topics, section_ids);
        self.apply(&mut state, plan).await
    }

    /// Drop the named section topics; ids not currently subscribed are ignored.
    pub async fn unsubscribe_sections(&self, section_ids: &[String]) -> Result<(), ConnectionError> {
        let mut state = self.subscriptions.lock().await;
        let plan = plan_unsubscribe(&state.topics, section_ids);
        self.apply(&mut state, plan).await
    }

    /// Each broker call is bounded by the write deadline.
    async fn apply(
        &self,
        state: &mut SubscriptionState,
        plan: SubscriptionPlan,
    ) -> Result<(), ConnectionError> {
        if plan.is_empty() {
            return Ok(());
        }
        let deadline = self.settings.write_timeout;
        let control = state.control.as_mut().ok_or(ConnectionError::Closed)?;

        if !plan.to_unsubscribe.is_empty() {
            tokio::time::timeout(deadline, control.unsubscribe(&plan.to_unsubscribe))
                .await
                .map_err(|_| ConnectionError::BrokerTimeout(deadline))??;
        }
        if !plan.to_subscribe.is_empty() {
            tokio::time::timeout(deadline, control.subscribe(&plan.to_subscribe))
                .await
                .map_err(|_| ConnectionError::BrokerTimeout(deadline))??;
        }

        state.topics.apply(&plan);
        Ok(())
    }

    /// Release everything this connection owns. Safe to call repeatedly;
    /// only the first call does any work.
    ///
    /// Every step is bounded by the write deadline so a stalled peer or
    /// broker cannot hold teardown open.
    pub async fn teardown(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        let deadline = self.settings.write_timeout;

        match tokio::time::timeout(deadline, self.subscriptions.lock()).await {
            Ok(mut state) => {
                let topics = state.topics.take_all();
                if let Some(mut control) = state.control.take() {
                    if !topics.is_empty() {
                        match tokio::time::timeout(deadline, control.unsubscribe(&topics)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::debug!(
                                connection_id = %self.id,
                                error = %e,
                                "Broker unsubscribe failed during teardown"
                            ),
                            Err(_) => tracing::debug!(
                                connection_id = %self.id,
                                "Broker unsubscribe timed out during teardown"
                            ),
                        }
                    }
                }
            }
            Err(_) => {
                tracing::debug!(
                    connection_id = %self.id,
                    "Subscription state busy during teardown; handle released on drop"
                );
            }
        }

        if let Err(e) = self.write(Message::Close(Some(reason.frame()))).await {
            tracing::debug!(connection_id = %self.id, error = %e, "Failed to send close frame");
        }

        let closed = tokio::time::timeout(deadline, async {
            let mut sink = self.outbound.lock().await;
            sink.close().await
        })
        .await;
        if !matches!(closed, Ok(Ok(()))) {
            tracing::debug!(connection_id = %self.id, "Socket did not close cleanly");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("closed", &self.is_closed())
            .finish()
    }
}
