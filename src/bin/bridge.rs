use std::sync::Arc;
use std::time::Duration;

use ctp_bridge::core::config::ConfigStore;
use ctp_bridge::core::PassthroughSession;
use ctp_bridge::ctp::{MessageBusOrderTransport, OrderEventService};
use ctp_bridge::engine::{DataPublisher, ExecutionEngine};
use ctp_bridge::model::TickBatch;
use ctp_bridge::pubsub::{FnSubscriber, RedisBackedMessageBus, RedisMarketDataTransport};

/// Usage: `ENV=development ctp-bridge [SEC_ID ...]`
///
/// Each security id given on the command line gets a subscriber that logs its
/// ticks.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let sec_ids: Vec<String> = std::env::args().skip(1).collect();
    let config = ConfigStore::load()?;

    let mut message_bus = RedisBackedMessageBus::new(&config.redis_url).await?;
    let order_sender = message_bus.publish_tx.clone();

    let publisher = DataPublisher::new(config.clone(), PassthroughSession::new()).await?;
    if !sec_ids.is_empty() {
        let printer = FnSubscriber::new(sec_ids, |batch: &TickBatch| {
            for tick in batch.ticks.iter() {
                log::info!("{} {} {}", tick.sec_id, tick.timestamp, tick.price);
            }
        });
        publisher.add_subscriber(Arc::new(printer))?;
    }
    let transport = RedisMarketDataTransport::new(&config.redis_url);
    let closer = transport.closer();
    let (_, mut router) = publisher.connect(transport).await?;

    let engine = ExecutionEngine::new(
        config.clone(),
        PassthroughSession::new(),
        MessageBusOrderTransport::new(order_sender),
    )
    .await?;
    engine.connect().await?;
    let order_events = OrderEventService::new(&config.redis_url, engine.tracker().clone());
    let sweeper = engine.spawn_sweeper(Duration::from_secs(1));

    let shutdown = tokio::select! {
        res = message_bus.publish_poll() => {
            res?;
            false
        }
        res = order_events.subscribe() => {
            res?;
            false
        }
        res = &mut router => {
            res??;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if shutdown {
        log::info!("shutting down");
        closer.close();
        router.await??;
    }
    sweeper.abort();
    Ok(())
}
