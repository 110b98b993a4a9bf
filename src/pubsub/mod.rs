pub mod router;
pub mod simple_message_bus;
pub mod subscribers;
pub mod subscription_registry;
pub mod transport;

pub use router::{DecodeErrorPolicy, MarketDataRouter, RouterState};
pub use simple_message_bus::{MessageConsumer, PublishPayload, RedisBackedMessageBus};
pub use subscribers::{ChannelSubscriber, FnSubscriber};
pub use subscription_registry::{
    FieldSelection, Subscriber, SubscriberId, SubscriptionRegistry, TopicResolution,
    TopicSubscribers,
};
pub use transport::{
    channel_transport, ChannelMarketDataTransport, MarketDataTransport, RedisMarketDataTransport,
    TickPublisher, TransportCloser,
};
