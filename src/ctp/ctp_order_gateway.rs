use crate::cache::OrderLifecycleCache;
use crate::core::error::{BridgeError, Result};
use crate::core::orders::OrderTransport;
use crate::ctp::types::{NativeCancelRequest, NativeOrder, NativeOrderRequest};
use crate::model::constants::PublishChannel;
use crate::model::CorrelationId;
use crate::pubsub::simple_message_bus::{MessageBusSender, RedisBackedMessageBus};
use crate::pubsub::PublishPayload;
use async_trait::async_trait;
use std::sync::Arc;

/// Hands native orders to the exchange-side bridge over the message bus.
pub struct MessageBusOrderTransport {
    message_bus_sender: MessageBusSender,
}

impl MessageBusOrderTransport {
    pub fn new(message_bus_sender: MessageBusSender) -> Self {
        MessageBusOrderTransport { message_bus_sender }
    }

    async fn send(&self, channel: PublishChannel, payload: String) -> Result<()> {
        let payload = PublishPayload {
            channel: channel.to_string(),
            payload,
        };
        RedisBackedMessageBus::publish_async(&self.message_bus_sender, payload)
            .await
            .map_err(|err| BridgeError::Transport(format!("{} not sent: {}", channel, err)))
    }
}

#[async_trait]
impl OrderTransport for MessageBusOrderTransport {
    async fn submit_order(&self, order: &NativeOrder, correlation_id: CorrelationId) -> Result<()> {
        let request = NativeOrderRequest {
            correlation_id,
            order: order.clone(),
        };
        let packed = RedisBackedMessageBus::pack_json(&request)?;
        self.send(PublishChannel::OrderRequest, packed).await
    }

    async fn cancel_order(&self, correlation_id: CorrelationId) -> Result<()> {
        let packed = RedisBackedMessageBus::pack_json(&NativeCancelRequest { correlation_id })?;
        self.send(PublishChannel::CancelOrder, packed).await
    }
}

/// Feeds exchange callbacks published on [`PublishChannel::OrderEvent`] into
/// the lifecycle tracker.
pub struct OrderEventService {
    redis_url: String,
    tracker: Arc<OrderLifecycleCache>,
}

impl OrderEventService {
    pub fn new(redis_url: &str, tracker: Arc<OrderLifecycleCache>) -> Self {
        OrderEventService {
            redis_url: redis_url.to_string(),
            tracker,
        }
    }

    pub async fn subscribe(&self) -> Result<()> {
        RedisBackedMessageBus::subscribe(
            &self.redis_url,
            vec![PublishChannel::OrderEvent.as_ref()],
            self.tracker.as_ref(),
        )
        .await
    }
}
