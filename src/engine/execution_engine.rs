use crate::cache::{ApplyOutcome, ExecutionListener, OrderEvents, OrderLifecycleCache};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::orders::{OrderGateway, OrderTransport};
use crate::core::session::ExchangeSession;
use crate::ctp::MarketPricing;
use crate::model::{ExchangeEvent, OrderId, OrderRequest, OrderStatus};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Execution side: trader login, order placement and the callback pump that
/// keeps the lifecycle tracker current.
pub struct ExecutionEngine<S, T> {
    config: Config,
    session: S,
    gateway: OrderGateway<T>,
}

impl<S, T> ExecutionEngine<S, T>
where
    S: ExchangeSession,
    T: OrderTransport,
{
    pub async fn new(config: Config, session: S, transport: T) -> Result<Self> {
        config.validate()?;
        session
            .login(
                &config.trader_front_address,
                &config.broker_id,
                &config.investor_id,
                &config.password,
            )
            .await?;
        let tracker = Arc::new(OrderLifecycleCache::new(config.terminal_grace()));
        let pricing = MarketPricing {
            offset: config.market_price_offset,
            minimum_price: config.minimum_price,
        };
        Ok(ExecutionEngine {
            gateway: OrderGateway::new(transport, tracker, pricing),
            config,
            session,
        })
    }

    pub async fn connect(&self) -> Result<()> {
        self.session.connect(&self.config.mq_sub_addr).await
    }

    pub fn gateway(&self) -> &OrderGateway<T> {
        &self.gateway
    }

    pub fn tracker(&self) -> &Arc<OrderLifecycleCache> {
        self.gateway.tracker()
    }

    pub fn set_listener(&self, listener: Arc<dyn ExecutionListener>) {
        self.tracker().set_listener(listener);
    }

    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderId> {
        self.gateway.place_order(order).await
    }

    pub async fn place_order_with_completion<F>(
        &self,
        order: &OrderRequest,
        on_complete: F,
    ) -> Result<OrderId>
    where
        F: FnOnce(&OrderStatus) + Send + Sync + 'static,
    {
        self.gateway
            .place_order_with_completion(order, on_complete)
            .await
    }

    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<()> {
        self.gateway.cancel_order(order_id).await
    }

    pub fn query_status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        self.gateway.query_status(order_id)
    }

    pub fn watch(&self, order_id: &OrderId) -> Result<OrderEvents> {
        self.tracker().watch(order_id)
    }

    pub fn open_orders(&self) -> Vec<OrderStatus> {
        self.tracker().open_orders()
    }

    pub fn apply(&self, event: ExchangeEvent) -> ApplyOutcome {
        self.tracker().apply(event)
    }

    /// Applies callbacks from `events` until the stream ends. Returns how many
    /// changed an order.
    pub async fn pump<E>(&self, mut events: E) -> usize
    where
        E: Stream<Item = ExchangeEvent> + Unpin,
    {
        let mut applied = 0;
        while let Some(event) = events.next().await {
            match self.apply(event) {
                ApplyOutcome::Applied => applied += 1,
                ApplyOutcome::Stale => log::debug!("stale exchange callback dropped"),
                ApplyOutcome::Unknown => log::warn!("exchange callback for an untracked order"),
            }
        }
        applied
    }

    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        self.tracker().clone().spawn_sweeper(interval)
    }
}
