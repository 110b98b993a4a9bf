use crate::core::error::{BridgeError, Result};
use crate::model::{decode_tick, TickBatch, TopicMap};
use crate::pubsub::{MarketDataTransport, SubscriberId, SubscriptionRegistry};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// What the receive loop does with a message that does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeErrorPolicy {
    /// Log a warning and keep listening.
    Drop,
    /// Stop the loop and return the decode error.
    Escalate,
}

impl Default for DecodeErrorPolicy {
    fn default() -> Self {
        DecodeErrorPolicy::Drop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RouterState {
    Stopped,
    Listening,
}

/// Decodes raw ticks and fans them out to interested subscribers.
pub struct MarketDataRouter {
    registry: Arc<SubscriptionRegistry>,
    policy: DecodeErrorPolicy,
    listening: AtomicBool,
    dropped: AtomicU64,
    dispatched: AtomicU64,
}

impl MarketDataRouter {
    pub fn new(registry: Arc<SubscriptionRegistry>, policy: DecodeErrorPolicy) -> Self {
        MarketDataRouter {
            registry,
            policy,
            listening: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn state(&self) -> RouterState {
        if self.listening.load(Ordering::SeqCst) {
            RouterState::Listening
        } else {
            RouterState::Stopped
        }
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn dispatched_batches(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Subscribes `transport` to the native topics of `topics` and routes
    /// messages until the transport closes, a transport error occurs, or a
    /// decode error escalates.
    pub async fn start<T>(&self, transport: &mut T, topics: &TopicMap) -> Result<()>
    where
        T: MarketDataTransport + ?Sized,
    {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::Transport(
                "router is already listening".to_string(),
            ));
        }
        log::info!("router {}", RouterState::Listening);
        let result = self.listen(transport, topics).await;
        self.listening.store(false, Ordering::SeqCst);
        match &result {
            Ok(()) => log::info!("router {}: transport closed", RouterState::Stopped),
            Err(err) => log::error!("router {}: {}", RouterState::Stopped, err),
        }
        result
    }

    async fn listen<T>(&self, transport: &mut T, topics: &TopicMap) -> Result<()>
    where
        T: MarketDataTransport + ?Sized,
    {
        let mut native_topics: Vec<String> = topics.keys().cloned().collect();
        native_topics.sort();
        transport.subscribe(&native_topics).await?;

        while let Some(raw) = transport.receive().await? {
            match decode_tick(&raw, topics) {
                Ok(tick) => {
                    self.notify_all(&TickBatch::single(tick));
                }
                Err(err) => match self.policy {
                    DecodeErrorPolicy::Drop => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        log::warn!("Received data which is not enough to use: {}", err);
                    }
                    DecodeErrorPolicy::Escalate => return Err(err),
                },
            }
        }
        Ok(())
    }

    /// Delivers `batch` once to every subscriber interested in any of its
    /// securities. Returns the number of subscribers reached.
    pub fn notify_all(&self, batch: &TickBatch) -> usize {
        let targets = self.registry.interested_in(batch);
        for (_, subscriber) in targets.iter() {
            subscriber.on_data(batch);
        }
        if !targets.is_empty() {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
        }
        targets.len()
    }

    pub fn notify(&self, sub_id: SubscriberId, batch: &TickBatch) -> Result<()> {
        self.registry.get(sub_id)?.on_data(batch);
        Ok(())
    }
}
