//! Connection registry: at most one live connection per user.
//!
//! ```text
//! register(new)                          unregister(conn)
//!   lock ─ remove old ─ unlock             lock ─ remove iff current is conn ─ unlock
//!   old.teardown(Replaced)                 conn.teardown(Normal)
//!   lock ─ insert new ─ unlock
//! ```
//!
//! The map lock only ever covers map mutation. Teardown I/O always runs
//! after the lock is released, so a slow socket cannot stall other users'
//! connects and disconnects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;

use crate::domain::foundation::UserId;

use super::connection::{CloseReason, Connection};

/// Process-wide map from user to their current connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<UserId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<UserId, Arc<Connection>>> {
        // A poisoned map is still structurally valid; keep serving.
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install `conn` as the user's current connection.
    ///
    /// Any existing connection for the same user is torn down first with
    /// a `replaced` close frame.
    pub async fn register(&self, conn: Arc<Connection>) {
        let user = conn.user().clone();

        let previous = self.map().remove(&user);
        if let Some(previous) = previous {
            tracing::info!(
                user_id = %user,
                connection_id = %previous.id(),
                replaced_by = %conn.id(),
                "Replacing existing realtime connection"
            );
            previous.teardown(CloseReason::Replaced).await;
        }

        // Another register for this user may have landed while the old
        // connection was being torn down.
        let raced = self.map().insert(user.clone(), Arc::clone(&conn));
        if let Some(raced) = raced {
            if raced.id() != conn.id() {
                raced.teardown(CloseReason::Replaced).await;
            }
        }

        tracing::info!(
            user_id = %user,
            connection_id = %conn.id(),
            "Realtime connection registered"
        );
    }

    /// Remove `conn` if it is still the user's current connection, then
    /// tear it down regardless.
    pub async fn unregister(&self, conn: &Arc<Connection>) {
        let removed = {
            let mut map = self.map();
            let is_current = map
                .get(conn.user())
                .is_some_and(|current| current.id() == conn.id());
            if is_current {
                map.remove(conn.user());
            }
            is_current
        };

        conn.teardown(CloseReason::Normal).await;

        tracing::info!(
            user_id = %conn.user(),
            connection_id = %conn.id(),
            removed,
            "Realtime connection closed"
        );
    }

    /// The user's current connection, if any.
    pub fn current(&self, user: &UserId) -> Option<Arc<Connection>> {
        self.map().get(user).cloned()
    }

    pub fn is_connected(&self, user: &UserId) -> bool {
        self.map().contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Tear down every live connection. Used on graceful server stop.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Connection>> = self.map().drain().map(|(_, conn)| conn).collect();
        if drained.is_empty() {
            return;
        }

        tracing::info!(count = drained.len(), "Closing realtime connections");
        join_all(
            drained
                .iter()
                .map(|conn| conn.teardown(CloseReason::Shutdown)),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::InMemoryMessageBroker;
    use crate::adapters::websocket::connection::test_support::{channel_sink, drain};
    use crate::adapters::websocket::connection::{ConnectionSettings, CLOSE_REPLACED};
    use crate::domain::realtime::Topic;
    use crate::ports::MessageBroker;
    use axum::extract::ws::Message;
    use futures::channel::mpsc::UnboundedReceiver;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn open(
        broker: &InMemoryMessageBroker,
        user_id: &str,
    ) -> (Arc<Connection>, UnboundedReceiver<Message>) {
        let subscription = broker.open_subscription().await.unwrap();
        let (sink, rx) = channel_sink();
        let conn = Arc::new(Connection::new(
            user(user_id),
            sink,
            subscription.control,
            ConnectionSettings::default(),
        ));
        conn.seed_fixed_topics().await.unwrap();
        (conn, rx)
    }

    #[tokio::test]
    async fn register_tracks_current_connection() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open(&broker, "u1").await;

        registry.register(Arc::clone(&conn)).await;

        assert_eq!(registry.len(), 1);
        assert!(registry.is_connected(&user("u1")));
        assert_eq!(registry.current(&user("u1")).unwrap().id(), conn.id());
    }

    #[tokio::test]
    async fn second_connection_replaces_first() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = open(&broker, "u1").await;
        let (second, _second_rx) = open(&broker, "u1").await;

        registry.register(Arc::clone(&first)).await;
        registry.register(Arc::clone(&second)).await;

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.current(&user("u1")).unwrap().id(), second.id());
        assert!(first.is_closed());
        assert!(!second.is_closed());

        // Only the second connection still holds the fixed topics
        assert_eq!(
            broker.subscriber_count(&Topic::user_mentions(&user("u1"))),
            1
        );

        let frames = drain(&mut first_rx);
        assert!(matches!(
            frames.last(),
            Some(Message::Close(Some(frame))) if frame.code == CLOSE_REPLACED
        ));
    }

    #[tokio::test]
    async fn stale_unregister_keeps_newer_connection() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (first, _first_rx) = open(&broker, "u1").await;
        let (second, _second_rx) = open(&broker, "u1").await;

        registry.register(Arc::clone(&first)).await;
        registry.register(Arc::clone(&second)).await;
        registry.unregister(&first).await;

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.current(&user("u1")).unwrap().id(), second.id());
        assert!(!second.is_closed());
    }

    #[tokio::test]
    async fn unregister_removes_and_tears_down() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open(&broker, "u1").await;

        registry.register(Arc::clone(&conn)).await;
        registry.unregister(&conn).await;

        assert!(registry.is_empty());
        assert!(conn.is_closed());
        assert_eq!(broker.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn unregister_of_unknown_connection_still_tears_down() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open(&broker, "u1").await;

        registry.unregister(&conn).await;

        assert!(registry.is_empty());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn users_are_independent() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = open(&broker, "a").await;
        let (b, _b_rx) = open(&broker, "b").await;

        registry.register(Arc::clone(&a)).await;
        registry.register(Arc::clone(&b)).await;

        assert_eq!(registry.len(), 2);
        assert!(!a.is_closed());
        assert!(!b.is_closed());
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let broker = InMemoryMessageBroker::new();
        let registry = ConnectionRegistry::new();
        let (a, _a_rx) = open(&broker, "a").await;
        let (b, _b_rx) = open(&broker, "b").await;
        registry.register(Arc::clone(&a)).await;
        registry.register(Arc::clone(&b)).await;

        registry.shutdown().await;

        assert!(registry.is_empty());
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert_eq!(broker.open_subscriptions(), 0);
    }
}
