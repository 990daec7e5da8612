//! Broker topic naming.
//!
//! Every topic is `<scope prefix>:<identifier>`. Two scopes are bound to a
//! user for the lifetime of their connection (mentions, notifications);
//! `section` topics are driven by client subscribe requests; `post` and
//! `comment` topics exist for producers that want fine-grained fan-out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

const SEPARATOR: char = ':';

/// The scope a topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicScope {
    UserMentions,
    UserNotifications,
    Section,
    Post,
    Comment,
}

impl TopicScope {
    pub const ALL: [TopicScope; 5] = [
        TopicScope::UserMentions,
        TopicScope::UserNotifications,
        TopicScope::Section,
        TopicScope::Post,
        TopicScope::Comment,
    ];

    /// Topic-name prefix for this scope.
    pub fn prefix(self) -> &'static str {
        match self {
            TopicScope::UserMentions => "user-mentions",
            TopicScope::UserNotifications => "user-notifications",
            TopicScope::Section => "section",
            TopicScope::Post => "post",
            TopicScope::Comment => "comment",
        }
    }

    /// Looks up a scope by its prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.prefix() == prefix)
    }

    /// Fixed scopes are seeded at upgrade and live as long as the connection.
    pub fn is_fixed(self) -> bool {
        matches!(self, TopicScope::UserMentions | TopicScope::UserNotifications)
    }

    /// Dynamic scopes are owned entirely by client subscribe/unsubscribe.
    pub fn is_dynamic(self) -> bool {
        matches!(self, TopicScope::Section)
    }
}

impl fmt::Display for TopicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A broker channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Builds the topic name for `scope` and `id`.
    pub fn new(scope: TopicScope, id: impl AsRef<str>) -> Self {
        Self(format!("{}{}{}", scope.prefix(), SEPARATOR, id.as_ref()))
    }

    pub fn user_mentions(user: &UserId) -> Self {
        Self::new(TopicScope::UserMentions, user.as_str())
    }

    pub fn user_notifications(user: &UserId) -> Self {
        Self::new(TopicScope::UserNotifications, user.as_str())
    }

    pub fn section(id: impl AsRef<str>) -> Self {
        Self::new(TopicScope::Section, id)
    }

    pub fn post(id: impl AsRef<str>) -> Self {
        Self::new(TopicScope::Post, id)
    }

    pub fn comment(id: impl AsRef<str>) -> Self {
        Self::new(TopicScope::Comment, id)
    }

    /// The two topics every connection for `user` carries from upgrade to close.
    pub fn fixed_for(user: &UserId) -> [Topic; 2] {
        [Self::user_mentions(user), Self::user_notifications(user)]
    }

    /// Parses a raw channel name back into a topic.
    ///
    /// Returns `None` for unknown prefixes and empty identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, id) = raw.split_once(SEPARATOR)?;
        if id.is_empty() {
            return None;
        }
        TopicScope::from_prefix(prefix)?;
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scope(&self) -> Option<TopicScope> {
        self.0
            .split_once(SEPARATOR)
            .and_then(|(prefix, _)| TopicScope::from_prefix(prefix))
    }

    /// The scope-specific identifier (section id, user id, ...).
    pub fn identifier(&self) -> &str {
        self.0
            .split_once(SEPARATOR)
            .map(|(_, id)| id)
            .unwrap_or_default()
    }

    pub fn is_fixed(&self) -> bool {
        self.scope().is_some_and(TopicScope::is_fixed)
    }

    pub fn is_dynamic(&self) -> bool {
        self.scope().is_some_and(TopicScope::is_dynamic)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("u-7").unwrap()
    }

    #[test]
    fn topic_names_use_scope_prefix() {
        assert_eq!(Topic::user_mentions(&user()).as_str(), "user-mentions:u-7");
        assert_eq!(
            Topic::user_notifications(&user()).as_str(),
            "user-notifications:u-7"
        );
        assert_eq!(Topic::section("s1").as_str(), "section:s1");
        assert_eq!(Topic::post("p1").as_str(), "post:p1");
        assert_eq!(Topic::comment("c1").as_str(), "comment:c1");
    }

    #[test]
    fn fixed_topics_are_mentions_and_notifications() {
        let fixed = Topic::fixed_for(&user());
        assert!(fixed.iter().all(Topic::is_fixed));
        assert!(fixed.iter().all(|t| !t.is_dynamic()));
    }

    #[test]
    fn only_section_topics_are_dynamic() {
        assert!(Topic::section("s1").is_dynamic());
        assert!(!Topic::post("p1").is_dynamic());
        assert!(!Topic::comment("c1").is_dynamic());
        assert!(!Topic::user_mentions(&user()).is_dynamic());
    }

    #[test]
    fn identifier_keeps_everything_after_first_separator() {
        let topic = Topic::section("a:b");
        assert_eq!(topic.identifier(), "a:b");
        assert_eq!(topic.scope(), Some(TopicScope::Section));
    }

    #[test]
    fn parse_round_trips_known_scopes() {
        for scope in TopicScope::ALL {
            let topic = Topic::new(scope, "x");
            assert_eq!(Topic::parse(topic.as_str()), Some(topic));
        }
    }

    #[test]
    fn parse_rejects_unknown_prefix_and_empty_id() {
        assert!(Topic::parse("thread:1").is_none());
        assert!(Topic::parse("section:").is_none());
        assert!(Topic::parse("section").is_none());
    }
}
