use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::error::{BridgeError, Result};
use crate::ctp::NativeOrderStatus;
use crate::model::{
    CorrelationId, ExchangeEvent, OrderEvent, OrderId, OrderState, OrderStatus, TradeReport,
};
use crate::pubsub::simple_message_bus::MessageConsumer;

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type CompletionCallback = Box<dyn FnOnce(&OrderStatus) + Send + Sync>;

/// User hooks for the five exchange callbacks. Every method defaults to a no-op.
///
/// Hooks for one order run in the order its callbacks were applied: the next
/// callback for that order waits until the previous hook has returned. Hooks
/// are not called for stale or duplicate callbacks, and must not feed another
/// callback for the same order back into the tracker.
pub trait ExecutionListener: Send + Sync {
    fn on_login(&self, _session_id: i32) {}

    fn on_order_submitted(&self, _correlation_id: CorrelationId, _request_id: i32) {}

    fn on_order_action_taken(&self, _correlation_id: CorrelationId, _request_id: i32) {}

    fn on_order_return(
        &self,
        _order_ref_id: &str,
        _notify_seq: i32,
        _status: NativeOrderStatus,
        _volume_traded: u32,
        _volume_total: u32,
        _seq_no: i64,
    ) {
    }

    fn on_trade_return(&self, _report: &TradeReport) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Duplicate or out-of-date callback, dropped without effect.
    Stale,
    /// No live record for the referenced order.
    Unknown,
}

/// Ordered stream of the events applied to one order. Dropping it stops
/// delivery; it ends when the order is evicted.
pub struct OrderEvents {
    rx: UnboundedReceiver<OrderEvent>,
}

impl OrderEvents {
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<OrderEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<OrderEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

struct OrderRecord {
    status: OrderStatus,
    touched_at: Instant,
    watchers: Vec<UnboundedSender<OrderEvent>>,
    on_complete: Option<CompletionCallback>,
    // held from the record update through listener delivery
    delivery: Arc<Mutex<()>>,
}

impl OrderRecord {
    fn publish(&mut self, event: OrderEvent) {
        self.watchers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn is_expired(&self, now: Instant, grace: Duration) -> bool {
        self.status.state.is_terminal()
            && now.saturating_duration_since(self.touched_at) >= grace
            && !self.in_flight()
    }

    /// A callback handler holds a clone of the delivery lock while it runs.
    fn in_flight(&self) -> bool {
        Arc::strong_count(&self.delivery) > 1
    }
}

fn lock_delivery(delivery: &Mutex<()>) -> MutexGuard<'_, ()> {
    match delivery.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

type Cache = Arc<DashMap<CorrelationId, OrderRecord>>;

/// Per-order lifecycle state driven by asynchronous, possibly duplicated and
/// reordered exchange callbacks.
///
/// Updates to one order are serialised by the map's shard lock; callbacks for
/// different orders proceed concurrently.
pub struct OrderLifecycleCache {
    cache: Cache,
    requests: DashMap<i32, CorrelationId>,
    listener: RwLock<Option<Arc<dyn ExecutionListener>>>,
    session_id: RwLock<Option<i32>>,
    grace: Duration,
}

impl OrderLifecycleCache {
    pub fn new(grace: Duration) -> OrderLifecycleCache {
        OrderLifecycleCache {
            cache: Arc::new(DashMap::new()),
            requests: DashMap::new(),
            listener: RwLock::new(None),
            session_id: RwLock::new(None),
            grace,
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn ExecutionListener>) {
        match self.listener.write() {
            Ok(mut slot) => *slot = Some(listener),
            Err(poisoned) => *poisoned.into_inner() = Some(listener),
        }
    }

    fn listener(&self) -> Option<Arc<dyn ExecutionListener>> {
        match self.listener.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn order_delivery(&self, correlation_id: CorrelationId) -> Option<Arc<Mutex<()>>> {
        self.cache
            .get(&correlation_id)
            .map(|record| record.delivery.clone())
    }

    pub fn session_id(&self) -> Option<i32> {
        match self.session_id.read() {
            Ok(id) => *id,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Creates the SUBMITTED record for a freshly placed order.
    pub fn register(
        &self,
        order_id: OrderId,
        volume_total: u32,
        on_complete: Option<CompletionCallback>,
    ) {
        let correlation_id = order_id.correlation_id;
        let record = OrderRecord {
            status: OrderStatus::submitted(order_id, volume_total, self.session_id()),
            touched_at: Instant::now(),
            watchers: vec![],
            on_complete,
            delivery: Arc::new(Mutex::new(())),
        };
        self.cache.insert(correlation_id, record);
    }

    /// Drops a record whose submission never reached the exchange.
    pub fn forget(&self, correlation_id: CorrelationId) {
        self.cache.remove(&correlation_id);
    }

    pub fn status(&self, order_id: &OrderId) -> Result<OrderStatus> {
        self.cache
            .get(&order_id.correlation_id)
            .map(|record| record.status.clone())
            .ok_or_else(|| BridgeError::UnknownOrder(order_id.clone()))
    }

    pub fn watch(&self, order_id: &OrderId) -> Result<OrderEvents> {
        let mut record = self
            .cache
            .get_mut(&order_id.correlation_id)
            .ok_or_else(|| BridgeError::UnknownOrder(order_id.clone()))?;
        let (tx, rx) = unbounded_channel();
        record.watchers.push(tx);
        Ok(OrderEvents { rx })
    }

    pub fn mark_cancel_requested(&self, order_id: &OrderId) -> bool {
        match self.cache.get_mut(&order_id.correlation_id) {
            Some(mut record) => {
                record.status.cancel_requested = true;
                true
            }
            None => false,
        }
    }

    pub fn order_for_request(&self, request_id: i32) -> Option<OrderId> {
        let correlation_id = *self.requests.get(&request_id)?;
        self.cache
            .get(&correlation_id)
            .map(|record| record.status.order_id.clone())
    }

    pub fn open_orders(&self) -> Vec<OrderStatus> {
        let mut open: Vec<OrderStatus> = self
            .cache
            .iter()
            .filter(|record| record.status.is_open())
            .map(|record| record.status.clone())
            .collect();
        open.sort_by_key(|status| status.order_id.correlation_id);
        open
    }

    pub fn apply(&self, event: ExchangeEvent) -> ApplyOutcome {
        match event {
            ExchangeEvent::LoggedIn { session_id } => {
                self.on_logged_in(session_id);
                ApplyOutcome::Applied
            }
            ExchangeEvent::OrderSubmitted {
                correlation_id,
                request_id,
            } => self.on_order_submitted(correlation_id, request_id),
            ExchangeEvent::OrderActionTaken {
                correlation_id,
                request_id,
            } => self.on_order_action_taken(correlation_id, request_id),
            ExchangeEvent::OrderReturn {
                order_ref_id,
                notify_seq,
                status,
                volume_traded,
                volume_total,
                seq_no,
            } => self.on_order_return(
                &order_ref_id,
                notify_seq,
                status,
                volume_traded,
                volume_total,
                seq_no,
            ),
            ExchangeEvent::TradeReturn(report) => self.on_trade_return(report),
        }
    }

    pub fn on_logged_in(&self, session_id: i32) {
        log::info!("trader session {} logged in", session_id);
        match self.session_id.write() {
            Ok(mut id) => *id = Some(session_id),
            Err(poisoned) => *poisoned.into_inner() = Some(session_id),
        }
        if let Some(listener) = self.listener() {
            listener.on_login(session_id);
        }
    }

    pub fn on_order_submitted(&self, correlation_id: CorrelationId, request_id: i32) -> ApplyOutcome {
        let delivery = self.order_delivery(correlation_id);
        let _serial = delivery.as_deref().map(lock_delivery);
        let outcome = match self.cache.get_mut(&correlation_id) {
            None => ApplyOutcome::Unknown,
            Some(mut record) => {
                record.touched_at = Instant::now();
                if record.status.request_id == Some(request_id) {
                    ApplyOutcome::Stale
                } else {
                    if let Some(previous) = record.status.request_id.replace(request_id) {
                        self.requests
                            .remove_if(&previous, |_, owner| *owner == correlation_id);
                    }
                    self.requests.insert(request_id, correlation_id);
                    record.publish(OrderEvent::Submitted { request_id });
                    ApplyOutcome::Applied
                }
            }
        };
        self.finish("order submitted", correlation_id, outcome, |listener| {
            listener.on_order_submitted(correlation_id, request_id)
        })
    }

    pub fn on_order_action_taken(
        &self,
        correlation_id: CorrelationId,
        request_id: i32,
    ) -> ApplyOutcome {
        let delivery = self.order_delivery(correlation_id);
        let _serial = delivery.as_deref().map(lock_delivery);
        let outcome = match self.cache.get_mut(&correlation_id) {
            None => ApplyOutcome::Unknown,
            Some(mut record) => {
                record.touched_at = Instant::now();
                if record.status.cancel_acknowledged {
                    ApplyOutcome::Stale
                } else {
                    record.status.cancel_acknowledged = true;
                    record.publish(OrderEvent::CancelAcknowledged { request_id });
                    ApplyOutcome::Applied
                }
            }
        };
        self.finish("order action", correlation_id, outcome, |listener| {
            listener.on_order_action_taken(correlation_id, request_id)
        })
    }

    /// Applies an order return only if `seq_no` is newer than the last one
    /// applied to that order. A terminal order never changes again.
    pub fn on_order_return(
        &self,
        order_ref_id: &str,
        notify_seq: i32,
        status: NativeOrderStatus,
        volume_traded: u32,
        volume_total: u32,
        seq_no: i64,
    ) -> ApplyOutcome {
        let correlation_id = match order_ref_id.trim().parse::<CorrelationId>() {
            Ok(id) => id,
            Err(_) => {
                log::debug!("order return with foreign order ref {:?}", order_ref_id);
                return ApplyOutcome::Unknown;
            }
        };

        let delivery = self.order_delivery(correlation_id);
        let _serial = delivery.as_deref().map(lock_delivery);
        let mut completion: Option<(CompletionCallback, OrderStatus)> = None;
        let outcome = match self.cache.get_mut(&correlation_id) {
            None => ApplyOutcome::Unknown,
            Some(mut record) => {
                record.touched_at = Instant::now();
                let seen = record.status.last_seq.map_or(false, |last| seq_no <= last);
                if seen || record.status.state.is_terminal() {
                    ApplyOutcome::Stale
                } else {
                    record.status.last_seq = Some(seq_no);
                    record.status.volume_traded = volume_traded;
                    record.status.volume_total = volume_total;
                    if let Some(state) = status.lifecycle() {
                        record.status.state = state;
                    }
                    let event = OrderEvent::Updated {
                        state: record.status.state,
                        volume_traded,
                        volume_total,
                        seq_no,
                    };
                    record.publish(event);
                    if record.status.state.is_terminal() {
                        log::info!(
                            "order {} reached {} ({}/{})",
                            record.status.order_id,
                            record.status.state,
                            volume_traded,
                            volume_total
                        );
                        let status = record.status.clone();
                        completion = record.on_complete.take().map(|cb| (cb, status));
                    }
                    ApplyOutcome::Applied
                }
            }
        };

        if let Some((callback, status)) = completion {
            callback(&status);
        }
        self.finish("order return", correlation_id, outcome, |listener| {
            listener.on_order_return(
                order_ref_id,
                notify_seq,
                status,
                volume_traded,
                volume_total,
                seq_no,
            )
        })
    }

    /// Records a fill. Terminality is left to the order returns.
    pub fn on_trade_return(&self, report: TradeReport) -> ApplyOutcome {
        let correlation_id = report.order_ref_id.trim().parse::<CorrelationId>().ok();
        let delivery = correlation_id.and_then(|id| self.order_delivery(id));
        let _serial = delivery.as_deref().map(lock_delivery);
        let outcome = match correlation_id {
            None => ApplyOutcome::Unknown,
            Some(correlation_id) => match self.cache.get_mut(&correlation_id) {
                None => ApplyOutcome::Unknown,
                Some(mut record) => {
                    record.touched_at = Instant::now();
                    if record
                        .status
                        .fills
                        .iter()
                        .any(|fill| fill.trade_id == report.trade_id)
                    {
                        ApplyOutcome::Stale
                    } else {
                        record.status.fills.push(report.clone());
                        record.publish(OrderEvent::Trade(report.clone()));
                        ApplyOutcome::Applied
                    }
                }
            },
        };
        if outcome == ApplyOutcome::Stale {
            log::debug!("duplicate trade {} ignored", report.trade_id);
            return outcome;
        }
        if let Some(listener) = self.listener() {
            listener.on_trade_return(&report);
        }
        outcome
    }

    fn finish<F: FnOnce(&dyn ExecutionListener)>(
        &self,
        what: &str,
        correlation_id: CorrelationId,
        outcome: ApplyOutcome,
        notify: F,
    ) -> ApplyOutcome {
        match outcome {
            ApplyOutcome::Stale => {
                log::debug!("stale {} for order {} ignored", what, correlation_id);
                return outcome;
            }
            ApplyOutcome::Unknown => {
                log::debug!("{} for unknown order {}", what, correlation_id);
            }
            ApplyOutcome::Applied => {}
        }
        if let Some(listener) = self.listener() {
            notify(listener.as_ref());
        }
        outcome
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    /// Removes terminal orders untouched for the grace window. An order with a
    /// callback still being handled is kept. The check is repeated under the
    /// shard lock so a racing callback keeps its order.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let grace = self.grace;
        let candidates: Vec<CorrelationId> = self
            .cache
            .iter()
            .filter(|record| record.is_expired(now, grace))
            .map(|record| *record.key())
            .collect();
        let mut evicted = 0;
        for correlation_id in candidates {
            if let Some((_, record)) = self
                .cache
                .remove_if(&correlation_id, |_, record| record.is_expired(now, grace))
            {
                if let Some(request_id) = record.status.request_id {
                    self.requests.remove(&request_id);
                }
                log::debug!("evicted order {}", record.status.order_id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Runs [`evict_expired`](Self::evict_expired) every `interval`, clamped to
    /// at least 10ms.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.evict_expired();
            }
        })
    }
}

#[async_trait]
impl MessageConsumer for OrderLifecycleCache {
    async fn consume(&self, msg: &[u8]) -> Result<()> {
        let event = serde_json::from_slice::<ExchangeEvent>(msg)?;
        log::debug!("{:?}", event);
        self.apply(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctp::types::{
        ORDER_STATUS_ALL_TRADED, ORDER_STATUS_CANCELED, ORDER_STATUS_NO_TRADE_QUEUEING,
        ORDER_STATUS_PART_TRADED_QUEUEING, ORDER_STATUS_UNKNOWN, SUBMIT_STATUS_ACCEPTED,
        SUBMIT_STATUS_INSERT_REJECTED,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn order_id(correlation_id: CorrelationId) -> OrderId {
        OrderId {
            sec_id: "rb1910.XSGE".to_string(),
            exchange: Some('S'),
            correlation_id,
        }
    }

    fn status(code: char) -> NativeOrderStatus {
        NativeOrderStatus::new(code, SUBMIT_STATUS_ACCEPTED)
    }

    fn cache_with(correlation_id: CorrelationId) -> OrderLifecycleCache {
        let cache = OrderLifecycleCache::new(Duration::from_secs(30));
        cache.register(order_id(correlation_id), 10, None);
        cache
    }

    fn trade(ref_id: &str, trade_id: &str, volume: u32) -> TradeReport {
        TradeReport {
            order_ref_id: ref_id.to_string(),
            order_sys_id: "sys-1".to_string(),
            trade_id: trade_id.to_string(),
            price: 3500.0,
            volume,
            trade_date: "20190902".to_string(),
            trade_time: "09:15:01".to_string(),
            order_local_id: "local-1".to_string(),
            seq_no: 1,
        }
    }

    #[test]
    fn registered_order_starts_submitted() {
        let cache = cache_with(1);
        let status = cache.status(&order_id(1)).unwrap();
        assert_eq!(status.state, OrderState::Submitted);
        assert_eq!(status.volume_total, 10);
        assert_eq!(status.last_seq, None);
    }

    #[test]
    fn unknown_order_status_fails() {
        let cache = cache_with(1);
        let err = cache.status(&order_id(2)).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownOrder(ref id) if id.correlation_id == 2));
    }

    #[test]
    fn duplicate_return_applies_once() {
        let cache = cache_with(1);
        let first = cache.on_order_return("1", 1, status(ORDER_STATUS_PART_TRADED_QUEUEING), 4, 10, 5);
        let second = cache.on_order_return("1", 1, status(ORDER_STATUS_PART_TRADED_QUEUEING), 4, 10, 5);
        assert_eq!(first, ApplyOutcome::Applied);
        assert_eq!(second, ApplyOutcome::Stale);
        let current = cache.status(&order_id(1)).unwrap();
        assert_eq!(current.state, OrderState::PartiallyFilled);
        assert_eq!(current.volume_traded, 4);
        assert_eq!(current.last_seq, Some(5));
    }

    #[test]
    fn older_sequence_is_ignored() {
        let cache = cache_with(1);
        cache.on_order_return("1", 2, status(ORDER_STATUS_PART_TRADED_QUEUEING), 6, 10, 5);
        let outcome = cache.on_order_return("1", 1, status(ORDER_STATUS_NO_TRADE_QUEUEING), 0, 10, 3);
        assert_eq!(outcome, ApplyOutcome::Stale);
        let current = cache.status(&order_id(1)).unwrap();
        assert_eq!(current.state, OrderState::PartiallyFilled);
        assert_eq!(current.volume_traded, 6);
        assert_eq!(current.last_seq, Some(5));
    }

    #[test]
    fn reordered_returns_converge_on_in_order_result() {
        let returns = vec![
            (3, status(ORDER_STATUS_NO_TRADE_QUEUEING), 0),
            (4, status(ORDER_STATUS_PART_TRADED_QUEUEING), 4),
            (7, status(ORDER_STATUS_ALL_TRADED), 10),
        ];

        let in_order = cache_with(1);
        for (seq, st, traded) in returns.iter() {
            in_order.on_order_return("1", 0, *st, *traded, 10, *seq);
        }
        let shuffled = cache_with(1);
        for index in &[2usize, 0, 1] {
            let (seq, st, traded) = returns[*index];
            shuffled.on_order_return("1", 0, st, traded, 10, seq);
        }

        let expected = in_order.status(&order_id(1)).unwrap();
        let actual = shuffled.status(&order_id(1)).unwrap();
        assert_eq!(expected.state, OrderState::Filled);
        assert_eq!(actual.state, expected.state);
        assert_eq!(actual.volume_traded, expected.volume_traded);
        assert_eq!(actual.last_seq, expected.last_seq);
    }

    #[test]
    fn terminal_order_never_regresses() {
        let cache = cache_with(1);
        cache.on_order_return("1", 0, status(ORDER_STATUS_CANCELED), 0, 10, 4);
        let outcome = cache.on_order_return("1", 0, status(ORDER_STATUS_NO_TRADE_QUEUEING), 0, 10, 9);
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(cache.status(&order_id(1)).unwrap().state, OrderState::Cancelled);
    }

    #[test]
    fn insert_rejection_is_terminal() {
        let cache = cache_with(1);
        let rejected = NativeOrderStatus::new(ORDER_STATUS_CANCELED, SUBMIT_STATUS_INSERT_REJECTED);
        cache.on_order_return("1", 0, rejected, 0, 10, 1);
        assert_eq!(cache.status(&order_id(1)).unwrap().state, OrderState::Rejected);
        assert!(cache.open_orders().is_empty());
    }

    #[test]
    fn unknown_status_advances_sequence_only() {
        let cache = cache_with(1);
        let outcome = cache.on_order_return("1", 0, status(ORDER_STATUS_UNKNOWN), 0, 10, 2);
        assert_eq!(outcome, ApplyOutcome::Applied);
        let current = cache.status(&order_id(1)).unwrap();
        assert_eq!(current.state, OrderState::Submitted);
        assert_eq!(current.last_seq, Some(2));
    }

    #[test]
    fn foreign_order_refs_are_unknown() {
        let cache = cache_with(1);
        assert_eq!(
            cache.on_order_return("abc", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 1),
            ApplyOutcome::Unknown
        );
        assert_eq!(
            cache.on_order_return("42", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 1),
            ApplyOutcome::Unknown
        );
    }

    #[test]
    fn submitted_callback_joins_request_id() {
        let cache = cache_with(1);
        assert_eq!(cache.on_order_submitted(1, 77), ApplyOutcome::Applied);
        assert_eq!(cache.on_order_submitted(1, 77), ApplyOutcome::Stale);
        assert_eq!(cache.order_for_request(77), Some(order_id(1)));
        assert_eq!(cache.status(&order_id(1)).unwrap().request_id, Some(77));
    }

    #[test]
    fn trades_are_recorded_once_and_do_not_decide_terminality() {
        let cache = cache_with(1);
        assert_eq!(cache.on_trade_return(trade("1", "t-1", 10)), ApplyOutcome::Applied);
        assert_eq!(cache.on_trade_return(trade("1", "t-1", 10)), ApplyOutcome::Stale);
        let current = cache.status(&order_id(1)).unwrap();
        assert_eq!(current.fills.len(), 1);
        assert_eq!(current.state, OrderState::Submitted);
    }

    #[test]
    fn action_taken_marks_cancel_acknowledged() {
        let cache = cache_with(1);
        assert!(cache.mark_cancel_requested(&order_id(1)));
        assert_eq!(cache.on_order_action_taken(1, 8), ApplyOutcome::Applied);
        assert_eq!(cache.on_order_action_taken(1, 8), ApplyOutcome::Stale);
        let current = cache.status(&order_id(1)).unwrap();
        assert!(current.cancel_requested);
        assert!(current.cancel_acknowledged);
        assert_eq!(current.state, OrderState::Submitted);
    }

    #[test]
    fn completion_callback_runs_once_on_terminal_state() {
        let cache = OrderLifecycleCache::new(Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_ref = calls.clone();
        cache.register(
            order_id(1),
            10,
            Some(Box::new(move |status: &OrderStatus| {
                assert_eq!(status.state, OrderState::Filled);
                calls_ref.fetch_add(1, Ordering::SeqCst);
            })),
        );
        cache.on_order_return("1", 0, status(ORDER_STATUS_PART_TRADED_QUEUEING), 5, 10, 1);
        cache.on_order_return("1", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 2);
        cache.on_order_return("1", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<String>>,
    }

    impl ExecutionListener for RecordingListener {
        fn on_login(&self, session_id: i32) {
            self.seen.lock().unwrap().push(format!("login:{}", session_id));
        }

        fn on_order_return(
            &self,
            order_ref_id: &str,
            _notify_seq: i32,
            _status: NativeOrderStatus,
            _volume_traded: u32,
            _volume_total: u32,
            seq_no: i64,
        ) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("return:{}:{}", order_ref_id, seq_no));
        }

        fn on_trade_return(&self, report: &TradeReport) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("trade:{}", report.trade_id));
        }
    }

    #[test]
    fn listener_sees_applied_events_only() {
        let cache = cache_with(1);
        let listener = Arc::new(RecordingListener::default());
        cache.set_listener(listener.clone());
        cache.on_logged_in(12);
        cache.on_order_return("1", 0, status(ORDER_STATUS_NO_TRADE_QUEUEING), 0, 10, 2);
        cache.on_order_return("1", 0, status(ORDER_STATUS_NO_TRADE_QUEUEING), 0, 10, 2);
        cache.on_trade_return(trade("1", "t-9", 1));
        assert_eq!(
            *listener.seen.lock().unwrap(),
            vec!["login:12", "return:1:2", "trade:t-9"]
        );
        assert_eq!(cache.session_id(), Some(12));
    }

    #[test]
    fn session_id_is_stamped_on_new_orders() {
        let cache = OrderLifecycleCache::new(Duration::from_secs(30));
        cache.on_logged_in(3);
        cache.register(order_id(5), 1, None);
        assert_eq!(cache.status(&order_id(5)).unwrap().session_id, Some(3));
    }

    #[test]
    fn watcher_receives_events_in_applied_order() {
        let cache = cache_with(1);
        let mut events = cache.watch(&order_id(1)).unwrap();
        cache.on_order_submitted(1, 4);
        cache.on_order_return("1", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 6);
        cache.on_order_return("1", 0, status(ORDER_STATUS_NO_TRADE_QUEUEING), 0, 10, 5);

        assert_eq!(events.try_recv(), Some(OrderEvent::Submitted { request_id: 4 }));
        assert_eq!(
            events.try_recv(),
            Some(OrderEvent::Updated {
                state: OrderState::Filled,
                volume_traded: 10,
                volume_total: 10,
                seq_no: 6,
            })
        );
        assert_eq!(events.try_recv(), None);
    }

    #[test]
    fn terminal_orders_are_evicted_after_grace() {
        let cache = cache_with(1);
        cache.register(order_id(2), 10, None);
        cache.on_order_submitted(1, 11);
        cache.on_order_return("1", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 1);

        assert_eq!(cache.evict_expired_at(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(31);
        assert_eq!(cache.evict_expired_at(later), 1);
        assert!(cache.status(&order_id(1)).is_err());
        assert_eq!(cache.order_for_request(11), None);
        // still open, never evicted
        assert!(cache.status(&order_id(2)).is_ok());
        assert_eq!(
            cache.on_order_return("1", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 2),
            ApplyOutcome::Unknown
        );
    }

    #[test]
    fn late_duplicate_extends_retention() {
        let cache = cache_with(1);
        cache.on_order_return("1", 0, status(ORDER_STATUS_CANCELED), 0, 10, 1);
        std::thread::sleep(Duration::from_millis(20));
        let before_duplicate = Instant::now();
        cache.on_order_return("1", 0, status(ORDER_STATUS_CANCELED), 0, 10, 1);
        // expiry is measured from the last callback, not from the terminal transition
        let just_before = before_duplicate + Duration::from_secs(30) - Duration::from_millis(10);
        assert_eq!(cache.evict_expired_at(just_before), 0);
    }

    #[derive(Default)]
    struct SlowListener {
        seqs: Mutex<Vec<i64>>,
    }

    impl ExecutionListener for SlowListener {
        fn on_order_return(
            &self,
            _order_ref_id: &str,
            _notify_seq: i32,
            _status: NativeOrderStatus,
            _volume_traded: u32,
            _volume_total: u32,
            seq_no: i64,
        ) {
            if seq_no == 4 {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.seqs.lock().unwrap().push(seq_no);
        }
    }

    #[test]
    fn listener_sees_one_order_in_sequence_order() {
        let cache = Arc::new(cache_with(1));
        let listener = Arc::new(SlowListener::default());
        cache.set_listener(listener.clone());

        let first = cache.clone();
        let handle = std::thread::spawn(move || {
            first.on_order_return("1", 0, status(ORDER_STATUS_PART_TRADED_QUEUEING), 4, 10, 4)
        });
        std::thread::sleep(Duration::from_millis(50));
        let second =
            cache.on_order_return("1", 0, status(ORDER_STATUS_PART_TRADED_QUEUEING), 5, 10, 5);

        assert_eq!(handle.join().unwrap(), ApplyOutcome::Applied);
        assert_eq!(second, ApplyOutcome::Applied);
        assert_eq!(*listener.seqs.lock().unwrap(), vec![4, 5]);
        assert_eq!(cache.status(&order_id(1)).unwrap().last_seq, Some(5));
    }

    #[test]
    fn resubmission_moves_the_request_join() {
        let cache = cache_with(1);
        cache.on_order_submitted(1, 11);
        assert_eq!(cache.on_order_submitted(1, 12), ApplyOutcome::Applied);
        assert_eq!(cache.order_for_request(11), None);
        assert_eq!(cache.order_for_request(12), Some(order_id(1)));
        assert_eq!(cache.status(&order_id(1)).unwrap().request_id, Some(12));
    }

    #[tokio::test]
    async fn zero_sweep_interval_is_clamped() {
        let cache = Arc::new(OrderLifecycleCache::new(Duration::from_millis(0)));
        cache.register(order_id(1), 10, None);
        cache.on_order_return("1", 0, status(ORDER_STATUS_ALL_TRADED), 10, 10, 1);

        let sweeper = cache.clone().spawn_sweeper(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());
        sweeper.abort();
    }

    #[tokio::test]
    async fn consumes_json_events_from_the_bus() {
        let cache = cache_with(1);
        let msg = br#"{"event":"OrderReturn","order_ref_id":"1","notify_seq":1,
            "status":{"order_status":"0","submit_status":"3"},
            "volume_traded":10,"volume_total":10,"seq_no":3}"#;
        cache.consume(msg).await.unwrap();
        assert_eq!(cache.status(&order_id(1)).unwrap().state, OrderState::Filled);
        assert!(cache.consume(b"not json").await.is_err());
    }
}
