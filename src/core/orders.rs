use crate::cache::{CompletionCallback, OrderLifecycleCache};
use crate::core::error::Result;
use crate::ctp::{convert_to_native_order, MarketPricing, NativeOrder};
use crate::model::{CorrelationId, OrderId, OrderRequest, OrderStatus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outbound half of the exchange trader connection.
///
/// Both calls return once the request has been handed off; acknowledgements
/// come back later as exchange events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderTransport: Send + Sync {
    async fn submit_order(&self, order: &NativeOrder, correlation_id: CorrelationId) -> Result<()>;

    async fn cancel_order(&self, correlation_id: CorrelationId) -> Result<()>;
}

pub struct OrderGateway<T> {
    transport: T,
    tracker: Arc<OrderLifecycleCache>,
    pricing: MarketPricing,
    next_id: AtomicU64,
}

impl<T: OrderTransport> OrderGateway<T> {
    pub fn new(transport: T, tracker: Arc<OrderLifecycleCache>, pricing: MarketPricing) -> Self {
        OrderGateway {
            transport,
            tracker,
            pricing,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn tracker(&self) -> &Arc<OrderLifecycleCache> {
        &self.tracker
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderId> {
        self.place(order, None).await
    }

    /// Like [`place_order`](Self::place_order); `on_complete` runs once when
    /// the order first reaches a terminal state.
    pub async fn place_order_with_completion<F>(
        &self,
        order: &OrderRequest,
        on_complete: F,
    ) -> Result<OrderId>
    where
        F: FnOnce(&OrderStatus) + Send + Sync + 'static,
    {
        self.place(order, Some(Box::new(on_complete))).await
    }

    async fn place(
        &self,
        order: &OrderRequest,
        on_complete: Option<CompletionCallback>,
    ) -> Result<OrderId> {
        let native = convert_to_native_order(order, &self.pricing)?;
        let correlation_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let order_id = OrderId {
            sec_id: order.sec_id.clone(),
            exchange: native.exchange,
            correlation_id,
        };
        // the record must exist before the exchange can call back
        self.tracker
            .register(order_id.clone(), order.volume, on_complete);
        if let Err(err) = self.transport.submit_order(&native, correlation_id).await {
            self.tracker.forget(correlation_id);
            log::error!("submit {} failed: {}", order_id, err);
            return Err(err);
        }
        log::info!(
            "submitted {} {:?} {}@{} as {}",
            order.side,
            native.offset_flag,
            native.volume,
            native.limit_price,
            order_id
        );
        Ok(order_id)
    }

    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<()> {
        if !self.tracker.mark_cancel_requested(order_id) {
            log::warn!("cancel requested for untracked order {}", order_id);
        }
        self.transport.cancel_order(order_id.correlation_id).await?;
        log::info!("cancel requested for {}", order_id);
        Ok(())
    }

    pub fn query_status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        self.tracker.status(order_id)
    }
}
