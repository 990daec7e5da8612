//! Realtime module - the pure rules of event distribution.
//!
//! Nothing in here touches a socket or the broker: topic naming, the event
//! envelope, client control parsing, the subscription diff, and the origin
//! check are all plain functions over plain data so they can be tested
//! directly.

pub mod channels;
pub mod control;
pub mod envelope;
pub mod event_types;
pub mod origin;
pub mod subscription;

pub use channels::{Topic, TopicScope};
pub use control::{ControlAction, ControlMessage};
pub use envelope::{relay_frame, EventEnvelope, FALLBACK_FRAME};
pub use origin::{OriginPolicy, DEFAULT_DEV_ORIGIN};
pub use subscription::{plan_seed, plan_subscribe, plan_unsubscribe, SubscriptionPlan, TopicSet};
