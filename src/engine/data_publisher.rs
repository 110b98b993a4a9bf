use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::session::ExchangeSession;
use crate::model::TickBatch;
use crate::pubsub::{
    FieldSelection, MarketDataRouter, MarketDataTransport, Subscriber, SubscriberId,
    SubscriptionRegistry, TopicResolution,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Data side: logs in, aggregates subscriptions, then runs the fan-out router
/// on its own task.
pub struct DataPublisher<S> {
    config: Config,
    session: S,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<MarketDataRouter>,
}

impl<S: ExchangeSession> DataPublisher<S> {
    pub async fn new(config: Config, session: S) -> Result<Self> {
        config.validate()?;
        session
            .login(
                &config.md_front_address,
                &config.broker_id,
                &config.investor_id,
                &config.password,
            )
            .await?;
        let registry = Arc::new(SubscriptionRegistry::new());
        let router = Arc::new(MarketDataRouter::new(
            registry.clone(),
            config.decode_error_policy,
        ));
        Ok(DataPublisher {
            config,
            session,
            registry,
            router,
        })
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<MarketDataRouter> {
        &self.router
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> Result<SubscriberId> {
        self.registry.add(subscriber)
    }

    pub fn remove_subscriber(&self, sub_id: SubscriberId) -> Result<Arc<dyn Subscriber>> {
        self.registry.remove(sub_id)
    }

    pub fn notify(&self, sub_id: SubscriberId, batch: &TickBatch) -> Result<()> {
        self.router.notify(sub_id, batch)
    }

    pub fn notify_all(&self, batch: &TickBatch) -> usize {
        self.router.notify_all(batch)
    }

    /// Brings the session online and starts routing from `transport`.
    ///
    /// The topic list is fixed here: subscribers added afterwards only receive
    /// ticks for instruments that were already subscribed.
    pub async fn connect<T>(
        &self,
        mut transport: T,
    ) -> Result<(TopicResolution, JoinHandle<Result<()>>)>
    where
        T: MarketDataTransport + 'static,
    {
        self.config.validate()?;
        let resolution = self.registry.resolve_all_topics();
        let fields = match &resolution.fields {
            FieldSelection::All => "ALL".to_string(),
            FieldSelection::Only(fields) => fields.iter().cloned().collect::<Vec<_>>().join(", "),
        };
        log::info!(
            "Subscribe data for {} and {}.",
            resolution.native_topics().join(", "),
            fields
        );

        self.session.connect(&self.config.mq_pub_addr).await?;

        let router = self.router.clone();
        let topics = resolution.topics.clone();
        let handle = tokio::spawn(async move { router.start(&mut transport, &topics).await });
        Ok((resolution, handle))
    }
}
