//! Subscription multiplexer core.
//!
//! A connection's broker subscriptions are modelled as a [`TopicSet`]. Client
//! requests are turned into a [`SubscriptionPlan`] by pure functions; the
//! connection performs the broker calls for the plan and only then applies it
//! to its set. Fixed per-user topics never appear in an unsubscribe plan.

use std::collections::{BTreeSet, HashSet};

use super::channels::Topic;

/// Topics currently subscribed on one connection's broker handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSet {
    topics: BTreeSet<Topic>,
}

impl TopicSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Client-controlled section topics.
    pub fn dynamic(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter().filter(|topic| topic.is_dynamic())
    }

    /// Records the outcome of a plan whose broker calls succeeded.
    pub fn apply(&mut self, plan: &SubscriptionPlan) {
        for topic in &plan.to_unsubscribe {
            self.topics.remove(topic);
        }
        self.topics.extend(plan.to_subscribe.iter().cloned());
    }

    /// Empties the set, returning everything that was subscribed.
    pub fn take_all(&mut self) -> Vec<Topic> {
        std::mem::take(&mut self.topics).into_iter().collect()
    }
}

/// The minimal broker calls needed to reach a desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPlan {
    pub to_subscribe: Vec<Topic>,
    pub to_unsubscribe: Vec<Topic>,
}

impl SubscriptionPlan {
    /// True when no broker call is needed.
    pub fn is_empty(&self) -> bool {
        self.to_subscribe.is_empty() && self.to_unsubscribe.is_empty()
    }
}

/// Plan for seeding the fixed per-user topics at upgrade time.
pub fn plan_seed(current: &TopicSet, fixed: &[Topic]) -> SubscriptionPlan {
    SubscriptionPlan {
        to_subscribe: missing_from(current, fixed.iter().cloned()),
        to_unsubscribe: Vec::new(),
    }
}

/// Plan for a `subscribe` request: the listed sections become the entire
/// dynamic set.
pub fn plan_subscribe(current: &TopicSet, desired_ids: &[String]) -> SubscriptionPlan {
    let desired: HashSet<Topic> = desired_ids.iter().map(Topic::section).collect();

    SubscriptionPlan {
        to_subscribe: missing_from(current, desired_ids.iter().map(Topic::section)),
        to_unsubscribe: current
            .dynamic()
            .filter(|topic| !desired.contains(*topic))
            .cloned()
            .collect(),
    }
}

/// Plan for an `unsubscribe` request: drop the listed sections that are
/// actually subscribed, ignore the rest.
pub fn plan_unsubscribe(current: &TopicSet, ids: &[String]) -> SubscriptionPlan {
    let mut seen = HashSet::new();

    SubscriptionPlan {
        to_subscribe: Vec::new(),
        to_unsubscribe: ids
            .iter()
            .map(Topic::section)
            .filter(|topic| topic.is_dynamic() && current.contains(topic))
            .filter(|topic| seen.insert(topic.clone()))
            .collect(),
    }
}

fn missing_from(current: &TopicSet, wanted: impl Iterator<Item = Topic>) -> Vec<Topic> {
    let mut seen = HashSet::new();
    wanted
        .filter(|topic| !current.contains(topic))
        .filter(|topic| seen.insert(topic.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use proptest::prelude::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn seeded() -> TopicSet {
        let user = UserId::new("u1").unwrap();
        let mut set = TopicSet::new();
        set.apply(&plan_seed(&set, &Topic::fixed_for(&user)));
        set
    }

    fn dynamic_ids(set: &TopicSet) -> BTreeSet<String> {
        set.dynamic().map(|t| t.identifier().to_string()).collect()
    }

    #[test]
    fn seed_adds_fixed_topics_once() {
        let set = seeded();
        assert_eq!(set.len(), 2);

        let user = UserId::new("u1").unwrap();
        assert!(plan_seed(&set, &Topic::fixed_for(&user)).is_empty());
    }

    #[test]
    fn subscribe_from_empty_subscribes_everything() {
        let set = seeded();
        let plan = plan_subscribe(&set, &ids(&["s1", "s2"]));

        assert_eq!(plan.to_subscribe, vec![Topic::section("s1"), Topic::section("s2")]);
        assert!(plan.to_unsubscribe.is_empty());
    }

    #[test]
    fn subscribe_replaces_previous_sections() {
        let mut set = seeded();
        set.apply(&plan_subscribe(&set, &ids(&["s1", "s2"])));

        let plan = plan_subscribe(&set, &ids(&["s2", "s3"]));
        assert_eq!(plan.to_subscribe, vec![Topic::section("s3")]);
        assert_eq!(plan.to_unsubscribe, vec![Topic::section("s1")]);

        set.apply(&plan);
        let expected: BTreeSet<String> = ["s2", "s3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dynamic_ids(&set), expected);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn repeated_subscribe_is_a_no_op() {
        let mut set = seeded();
        set.apply(&plan_subscribe(&set, &ids(&["s1"])));
        assert!(plan_subscribe(&set, &ids(&["s1"])).is_empty());
    }

    #[test]
    fn empty_subscribe_clears_dynamic_topics_only() {
        let mut set = seeded();
        set.apply(&plan_subscribe(&set, &ids(&["s1", "s2"])));
        set.apply(&plan_subscribe(&set, &[]));

        assert_eq!(set.dynamic().count(), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn unsubscribe_unknown_section_is_a_no_op() {
        let set = seeded();
        let plan = plan_unsubscribe(&set, &ids(&["never-subscribed"]));
        assert!(plan.is_empty());
    }

    #[test]
    fn unsubscribe_drops_only_listed_sections() {
        let mut set = seeded();
        set.apply(&plan_subscribe(&set, &ids(&["s1", "s2"])));

        let plan = plan_unsubscribe(&set, &ids(&["s1", "s1"]));
        assert_eq!(plan.to_unsubscribe, vec![Topic::section("s1")]);

        set.apply(&plan);
        let expected: BTreeSet<String> = ["s2".to_string()].into_iter().collect();
        assert_eq!(dynamic_ids(&set), expected);
    }

    #[test]
    fn take_all_empties_the_set() {
        let mut set = seeded();
        set.apply(&plan_subscribe(&set, &ids(&["s1"])));

        let all = set.take_all();
        assert_eq!(all.len(), 3);
        assert!(set.is_empty());
    }

    fn section_ids() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z0-9]{1,6}", 0..8)
    }

    proptest! {
        #[test]
        fn subscribe_a_then_b_leaves_exactly_b(a in section_ids(), b in section_ids()) {
            let mut set = seeded();
            set.apply(&plan_subscribe(&set, &a));
            set.apply(&plan_subscribe(&set, &b));

            let expected: BTreeSet<String> = b.iter().cloned().collect();
            prop_assert_eq!(dynamic_ids(&set), expected);
            prop_assert_eq!(set.len(), 2 + b.iter().collect::<HashSet<_>>().len());
        }

        #[test]
        fn fixed_topics_are_never_unsubscribed(a in section_ids(), b in section_ids()) {
            let user = UserId::new("u1").unwrap();
            let mut set = seeded();
            set.apply(&plan_subscribe(&set, &a));

            let mut hostile = b.clone();
            hostile.push("u1".to_string());
            let plans = [plan_subscribe(&set, &hostile), plan_unsubscribe(&set, &hostile)];

            for plan in &plans {
                prop_assert!(plan.to_unsubscribe.iter().all(Topic::is_dynamic));
            }
            set.apply(&plans[1]);
            for topic in Topic::fixed_for(&user) {
                prop_assert!(set.contains(&topic));
            }
        }
    }
}
