//! Active market-data subscribers and the topic -> subscriber reverse index.
//!
//! Topics are the external security ids subscribers declare (`rb1910.XSGE`);
//! the exchange-level subscription list is derived from them with
//! [`resolve_all_topics`](SubscriptionRegistry::resolve_all_topics).

use crate::core::error::{BridgeError, Result};
use crate::model::{native_instrument_id, TickBatch, TopicMap};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type SubscriberId = u64;

/// A market-data consumer: what it wants and where batches go.
pub trait Subscriber: Send + Sync {
    fn subscribed_topics(&self) -> Vec<String>;

    /// Requested tick fields; `None` means all fields.
    fn subscribed_fields(&self) -> Option<Vec<String>> {
        None
    }

    fn on_data(&self, batch: &TickBatch);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    All,
    Only(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicResolution {
    /// native instrument id -> external security id
    pub topics: TopicMap,
    pub fields: FieldSelection,
}

impl TopicResolution {
    pub fn native_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }
}

struct Registration {
    subscriber: Arc<dyn Subscriber>,
    // captured at add time; remove unwinds exactly these entries
    topics: Vec<String>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: SubscriberId,
    subscribers: HashMap<SubscriberId, Registration>,
    topics_to_subscribers: HashMap<String, HashSet<SubscriberId>>,
}

/// Guarded by one lock so a dispatch always sees the map and the reverse index
/// in the same state.
pub struct SubscriptionRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        SubscriptionRegistry::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> SubscriptionRegistry {
        SubscriptionRegistry {
            inner: RwLock::new(RegistryInner {
                next_id: 1,
                ..RegistryInner::default()
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add(&self, subscriber: Arc<dyn Subscriber>) -> Result<SubscriberId> {
        let mut topics = subscriber.subscribed_topics();
        topics.sort();
        topics.dedup();
        for topic in topics.iter() {
            if let Err(err) = native_instrument_id(topic) {
                return Err(BridgeError::InvalidSubscriber(err.to_string()));
            }
        }

        let mut inner = self.write();
        let sub_id = inner.next_id;
        inner.next_id += 1;
        for topic in topics.iter() {
            log::debug!("Add subscriber {} to topic {}.", sub_id, topic);
            inner
                .topics_to_subscribers
                .entry(topic.clone())
                .or_insert_with(HashSet::new)
                .insert(sub_id);
        }
        inner
            .subscribers
            .insert(sub_id, Registration { subscriber, topics });
        Ok(sub_id)
    }

    /// Removes the subscriber and its reverse-index entries. Emptied topic sets
    /// are pruned.
    pub fn remove(&self, sub_id: SubscriberId) -> Result<Arc<dyn Subscriber>> {
        let mut inner = self.write();
        let registration = inner
            .subscribers
            .remove(&sub_id)
            .ok_or(BridgeError::UnknownSubscriber(sub_id))?;
        for topic in registration.topics.iter() {
            log::debug!("Remove subscriber {} from topic {}.", sub_id, topic);
            let emptied = match inner.topics_to_subscribers.get_mut(topic) {
                Some(ids) => {
                    ids.remove(&sub_id);
                    ids.is_empty()
                }
                None => false,
            };
            if emptied {
                inner.topics_to_subscribers.remove(topic);
            }
        }
        Ok(registration.subscriber)
    }

    /// Subscribers of `topic`, read in place under the registry's read lock.
    pub fn subscribers_for<'a>(&'a self, topic: &'a str) -> TopicSubscribers<'a> {
        TopicSubscribers {
            inner: self.read(),
            topic,
        }
    }

    pub fn get(&self, sub_id: SubscriberId) -> Result<Arc<dyn Subscriber>> {
        self.read()
            .subscribers
            .get(&sub_id)
            .map(|registration| registration.subscriber.clone())
            .ok_or(BridgeError::UnknownSubscriber(sub_id))
    }

    /// Subscribers interested in any security in `batch`, each listed once,
    /// taken from a single consistent view of the registry.
    pub fn interested_in(&self, batch: &TickBatch) -> Vec<(SubscriberId, Arc<dyn Subscriber>)> {
        let inner = self.read();
        let mut ids: Vec<SubscriberId> = batch
            .sec_ids()
            .filter_map(|sec_id| inner.topics_to_subscribers.get(sec_id))
            .flat_map(|ids| ids.iter().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| {
                inner
                    .subscribers
                    .get(&id)
                    .map(|registration| (id, registration.subscriber.clone()))
            })
            .collect()
    }

    /// Aggregates every declared topic into the exchange-level subscription
    /// list. One subscriber asking for all fields makes the aggregate `All`.
    pub fn resolve_all_topics(&self) -> TopicResolution {
        let inner = self.read();
        let mut topics = TopicMap::new();
        let mut fields = FieldSelection::Only(BTreeSet::new());
        for registration in inner.subscribers.values() {
            for topic in registration.topics.iter() {
                // topics were validated on add
                if let Ok(native) = native_instrument_id(topic) {
                    topics.insert(native, topic.clone());
                }
            }
            fields = match (fields, registration.subscriber.subscribed_fields()) {
                (FieldSelection::Only(mut acc), Some(requested)) => {
                    acc.extend(requested);
                    FieldSelection::Only(acc)
                }
                _ => FieldSelection::All,
            };
        }
        TopicResolution { topics, fields }
    }

    pub fn len(&self) -> usize {
        self.read().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().subscribers.is_empty()
    }
}

/// Borrowed view of one topic's subscribers.
///
/// Holds the registry's read lock until dropped: adding or removing a
/// subscriber on the same thread while a view is alive deadlocks.
pub struct TopicSubscribers<'a> {
    inner: RwLockReadGuard<'a, RegistryInner>,
    topic: &'a str,
}

impl<'a> TopicSubscribers<'a> {
    fn ids(&self) -> Option<&HashSet<SubscriberId>> {
        self.inner.topics_to_subscribers.get(self.topic)
    }

    pub fn contains(&self, sub_id: &SubscriberId) -> bool {
        self.ids().map_or(false, |ids| ids.contains(sub_id))
    }

    pub fn len(&self) -> usize {
        self.ids().map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = SubscriberId> + '_ {
        self.ids().into_iter().flatten().copied()
    }

    /// Owned copy of the ids.
    pub fn to_set(&self) -> HashSet<SubscriberId> {
        self.iter().collect()
    }
}
