//! EventPublisher port - the interface CRUD handlers use to emit events.
//!
//! Handlers call this after their write has committed. Publishing is
//! fire-and-forget: the call returns immediately, delivery is best-effort and
//! at-most-once, and a failure never reaches the HTTP response. Handlers
//! depend on this trait only, never on the broker client.

use serde_json::Value as JsonValue;

use crate::domain::foundation::UserId;
use crate::domain::realtime::Topic;

/// Port for publishing realtime events.
///
/// # Example
///
/// ```ignore
/// // After inserting the post row:
/// publisher.publish_to_post(&section_id, &post.id, event_types::NEW_POST, json!(post));
/// ```
pub trait EventPublisher: Send + Sync {
    /// Publish one event to one topic.
    fn publish(&self, topic: &Topic, event_type: &str, payload: JsonValue);

    /// Publish the same event to several topics as independent envelopes.
    fn publish_all(&self, topics: &[Topic], event_type: &str, payload: JsonValue) {
        for topic in topics {
            self.publish(topic, event_type, payload.clone());
        }
    }

    /// Publish to a post topic and its parent section topic.
    fn publish_to_post(&self, section_id: &str, post_id: &str, event_type: &str, payload: JsonValue) {
        self.publish_all(
            &[Topic::post(post_id), Topic::section(section_id)],
            event_type,
            payload,
        );
    }

    /// Publish to a comment topic and its parent post topic.
    fn publish_to_comment(&self, post_id: &str, comment_id: &str, event_type: &str, payload: JsonValue) {
        self.publish_all(
            &[Topic::comment(comment_id), Topic::post(post_id)],
            event_type,
            payload,
        );
    }

    /// Publish to a user's notification topic.
    fn notify_user(&self, user: &UserId, event_type: &str, payload: JsonValue) {
        self.publish(&Topic::user_notifications(user), event_type, payload);
    }

    /// Publish to a user's mention topic.
    fn mention_user(&self, user: &UserId, event_type: &str, payload: JsonValue) {
        self.publish(&Topic::user_mentions(user), event_type, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, topic: &Topic, event_type: &str, _payload: JsonValue) {
            self.calls
                .lock()
                .unwrap()
                .push((topic.to_string(), event_type.to_string()));
        }
    }

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    #[test]
    fn publish_to_post_fans_out_to_post_and_section() {
        let publisher = RecordingPublisher::default();
        publisher.publish_to_post("s1", "p1", "new_post", json!({"id": "p1"}));

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("post:p1".to_string(), "new_post".to_string()),
                ("section:s1".to_string(), "new_post".to_string()),
            ]
        );
    }

    #[test]
    fn publish_to_comment_fans_out_to_comment_and_post() {
        let publisher = RecordingPublisher::default();
        publisher.publish_to_comment("p1", "c1", "new_comment", json!({}));

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls[0].0, "comment:c1");
        assert_eq!(calls[1].0, "post:p1");
    }

    #[test]
    fn user_helpers_target_fixed_topics() {
        let publisher = RecordingPublisher::default();
        let user = UserId::new("u1").unwrap();
        publisher.notify_user(&user, "notification", json!({}));
        publisher.mention_user(&user, "mention", json!({}));

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls[0].0, "user-notifications:u1");
        assert_eq!(calls[1].0, "user-mentions:u1");
    }
}
