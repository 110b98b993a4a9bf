
#[cfg(test)]
mod subscription_registry_test {
    use ctp_bridge::core::BridgeError;
    use ctp_bridge::model::{decode_tick, TickBatch, TopicMap};
    use ctp_bridge::pubsub::{FieldSelection, SubscriptionRegistry};
    use std::collections::{BTreeSet, HashSet};
    use std::sync::Arc;
    use crate::test_common::common::*;

    fn batch(raw: &str, topics: &TopicMap) -> TickBatch {
        TickBatch::single(decode_tick(raw.as_bytes(), topics).unwrap())
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        before_each();
        let registry = SubscriptionRegistry::new();
        let a = registry
            .add(Arc::new(RecordingSubscriber::new(&["rb1910.XSGE"])))
            .unwrap();
        let b = registry
            .add(Arc::new(RecordingSubscriber::new(&["rb1910.XSGE"])))
            .unwrap();
        assert!(b > a);
        assert_eq!(registry.len(), 2);
        let expected: HashSet<_> = vec![a, b].into_iter().collect();
        assert_eq!(registry.subscribers_for("rb1910.XSGE").to_set(), expected);
        assert_eq!(registry.subscribers_for("rb1910.XSGE").len(), 2);
    }

    #[test]
    fn remove_prunes_reverse_index() {
        before_each();
        let registry = SubscriptionRegistry::new();
        let a = registry
            .add(Arc::new(RecordingSubscriber::new(&["rb1910.XSGE", "IF1909.CCFX"])))
            .unwrap();
        let b = registry
            .add(Arc::new(RecordingSubscriber::new(&["IF1909.CCFX"])))
            .unwrap();

        registry.remove(a).unwrap();
        assert!(registry.subscribers_for("rb1910.XSGE").is_empty());
        assert_eq!(
            registry.subscribers_for("IF1909.CCFX").iter().collect::<Vec<_>>(),
            vec![b]
        );
        assert_eq!(registry.resolve_all_topics().native_topics(), vec!["IF1909"]);

        let err = registry.remove(a).err().unwrap();
        assert!(matches!(err, BridgeError::UnknownSubscriber(id) if id == a));
    }

    #[test]
    fn malformed_topic_rejects_subscriber() {
        before_each();
        let registry = SubscriptionRegistry::new();
        let err = registry
            .add(Arc::new(RecordingSubscriber::new(&["rb1910.XSGE", "rb1910"])))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::InvalidSubscriber(_)));
        assert!(registry.is_empty());
        assert!(registry.subscribers_for("rb1910.XSGE").is_empty());
    }

    #[test]
    fn resolution_maps_native_ids_back_to_external() {
        before_each();
        let registry = SubscriptionRegistry::new();
        registry
            .add(Arc::new(RecordingSubscriber::new(&["cf001.XZCE", "rb1910.XSGE"])))
            .unwrap();
        let resolution = registry.resolve_all_topics();
        assert_eq!(resolution.native_topics(), vec!["CF001", "rb1910"]);
        assert_eq!(resolution.topics["CF001"], "cf001.XZCE");
        assert_eq!(resolution.topics["rb1910"], "rb1910.XSGE");
    }

    #[test]
    fn field_union_collapses_to_all() {
        before_each();
        let registry = SubscriptionRegistry::new();
        registry
            .add(Arc::new(
                RecordingSubscriber::new(&["rb1910.XSGE"]).with_fields(&["LastPrice"]),
            ))
            .unwrap();
        registry
            .add(Arc::new(
                RecordingSubscriber::new(&["IF1909.CCFX"]).with_fields(&["Volume"]),
            ))
            .unwrap();
        let expected: BTreeSet<String> = vec!["LastPrice".to_string(), "Volume".to_string()]
            .into_iter()
            .collect();
        assert_eq!(
            registry.resolve_all_topics().fields,
            FieldSelection::Only(expected)
        );

        registry
            .add(Arc::new(RecordingSubscriber::new(&["IF1909.CCFX"])))
            .unwrap();
        assert_eq!(registry.resolve_all_topics().fields, FieldSelection::All);
    }

    #[test]
    fn interested_in_lists_each_subscriber_once() {
        before_each();
        let registry = SubscriptionRegistry::new();
        let both = registry
            .add(Arc::new(RecordingSubscriber::new(&["rb1910.XSGE", "IF1909.CCFX"])))
            .unwrap();
        registry
            .add(Arc::new(RecordingSubscriber::new(&["cu1909.XSGE"])))
            .unwrap();
        let topics = registry.resolve_all_topics().topics;
        let mut ticks = batch("rb1910,20190902 09:15:01,3456", &topics).ticks;
        ticks.extend(batch("IF1909,20190902 09:30:00,3850.2", &topics).ticks);

        let targets = registry.interested_in(&TickBatch::new(ticks));
        let ids: Vec<_> = targets.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![both]);
    }
}
