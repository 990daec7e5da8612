//! Event type names clients switch on.

pub const NEW_POST: &str = "new_post";
pub const POST_UPDATED: &str = "post_updated";
pub const POST_DELETED: &str = "post_deleted";
pub const NEW_COMMENT: &str = "new_comment";
pub const COMMENT_UPDATED: &str = "comment_updated";
pub const COMMENT_DELETED: &str = "comment_deleted";
pub const REACTION: &str = "reaction";
pub const MENTION: &str = "mention";
pub const NOTIFICATION: &str = "notification";
pub const MODERATION_ACTION: &str = "moderation_action";

/// Generic wrapper type for broker payloads that were not published as envelopes.
pub const MESSAGE: &str = "message";

pub const ALL: &[&str] = &[
    NEW_POST,
    POST_UPDATED,
    POST_DELETED,
    NEW_COMMENT,
    COMMENT_UPDATED,
    COMMENT_DELETED,
    REACTION,
    MENTION,
    NOTIFICATION,
    MODERATION_ACTION,
    MESSAGE,
];
