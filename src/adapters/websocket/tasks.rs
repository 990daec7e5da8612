//! The three per-connection tasks.
//!
//! ```text
//!            ┌──────────── CancellationToken ────────────┐
//!            ▼                     ▼                     ▼
//!       read_loop             write_loop           keepalive_loop
//!   socket → control msgs   broker → socket        ping every interval
//!   (refresh deadline       (relay_frame)          (guarded write path)
//!    on pong)
//! ```
//!
//! Any fatal error cancels the shared scope; the other two tasks observe
//! it and return. The gateway then unregisters the connection.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};

use crate::domain::realtime::{relay_frame, ControlAction, ControlMessage};
use crate::ports::BrokerMessageStream;

use super::connection::Connection;

/// Read client frames until the socket closes, errors, goes quiet past the
/// pong deadline, or the connection is cancelled.
pub async fn read_loop<S>(conn: Arc<Connection>, mut inbound: S)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let pong_timeout = conn.settings().pong_timeout;
    let mut deadline = Instant::now() + pong_timeout;

    loop {
        let next = tokio::select! {
            _ = conn.cancel_token().cancelled() => break,
            next = timeout_at(deadline, inbound.next()) => next,
        };

        let frame = match next {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                tracing::debug!(connection_id = %conn.id(), error = %e, "Socket read failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(connection_id = %conn.id(), "Read deadline elapsed without pong");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                // A pending broker call must not outlive the scope.
                let applied = tokio::select! {
                    _ = conn.cancel_token().cancelled() => false,
                    applied = handle_control(&conn, &text) => applied,
                };
                if !applied {
                    break;
                }
            }
            Message::Pong(_) => {
                deadline = Instant::now() + pong_timeout;
            }
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) => {}
        }
    }

    conn.cancel();
}

/// Returns `false` when the broker rejected the change and the connection
/// must be torn down.
async fn handle_control(conn: &Connection, text: &str) -> bool {
    let Some(control) = ControlMessage::parse(text) else {
        tracing::debug!(connection_id = %conn.id(), "Ignoring malformed client frame");
        return true;
    };

    let result = match control.action {
        ControlAction::Subscribe => conn.subscribe_sections(&control.section_ids).await,
        ControlAction::Unsubscribe => conn.unsubscribe_sections(&control.section_ids).await,
    };

    match result {
        Ok(()) => {
            tracing::debug!(
                connection_id = %conn.id(),
                action = ?control.action,
                sections = control.section_ids.len(),
                "Applied subscription change"
            );
            true
        }
        Err(e) => {
            tracing::debug!(
                connection_id = %conn.id(),
                error = %e,
                "Subscription change failed"
            );
            false
        }
    }
}

/// Relay broker messages to the socket until the subscription ends or the
/// connection is cancelled.
pub async fn write_loop(conn: Arc<Connection>, mut messages: BrokerMessageStream) {
    loop {
        let next = tokio::select! {
            _ = conn.cancel_token().cancelled() => break,
            next = messages.next() => next,
        };

        match next {
            Some(Ok(message)) => {
                let frame = relay_frame(&message.payload);
                if let Err(e) = conn.send(Message::Text(frame)).await {
                    tracing::debug!(
                        connection_id = %conn.id(),
                        topic = %message.topic,
                        error = %e,
                        "Relay write failed"
                    );
                    break;
                }
            }
            Some(Err(e)) => {
                tracing::debug!(connection_id = %conn.id(), error = %e, "Broker receive failed");
                break;
            }
            None => {
                tracing::debug!(connection_id = %conn.id(), "Broker subscription ended");
                break;
            }
        }
    }

    conn.cancel();
}

/// Send a protocol ping on every interval tick until cancelled.
pub async fn keepalive_loop(conn: Arc<Connection>) {
    let period = conn.settings().ping_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = conn.cancel_token().cancelled() => return,
            _ = ticker.tick() => {}
        }

        if let Err(e) = conn.send(Message::Ping(Vec::new())).await {
            tracing::debug!(connection_id = %conn.id(), error = %e, "Ping failed");
            conn.cancel();
            return;
        }
    }
}
