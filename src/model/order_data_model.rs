use crate::ctp::NativeOrderStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CorrelationId = u64;

#[derive(Deserialize, Serialize, Debug, strum_macros::Display, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Deserialize, Serialize, Debug, strum_macros::Display, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Deserialize, Serialize, Debug, strum_macros::Display, Clone, Copy, PartialEq, Eq)]
pub enum OrderOffset {
    Open,
    Close,
    CloseToday,
}

impl Default for OrderOffset {
    fn default() -> Self {
        OrderOffset::Open
    }
}

/// Logical order as handed to the gateway.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub sec_id: String,
    pub side: OrderSide,
    pub volume: u32,
    #[serde(rename = "type")]
    pub type_: OrderType,
    pub price: f64,
    #[serde(default)]
    pub offset: OrderOffset,
}

impl OrderRequest {
    pub fn limit(sec_id: &str, side: OrderSide, volume: u32, price: f64) -> Self {
        OrderRequest {
            sec_id: sec_id.to_string(),
            side,
            volume,
            type_: OrderType::Limit,
            price,
            offset: OrderOffset::Open,
        }
    }

    pub fn market(sec_id: &str, side: OrderSide, volume: u32, reference_price: f64) -> Self {
        OrderRequest {
            type_: OrderType::Market,
            ..OrderRequest::limit(sec_id, side, volume, reference_price)
        }
    }

    pub fn with_offset(mut self, offset: OrderOffset) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId {
    pub sec_id: String,
    pub exchange: Option<char>,
    pub correlation_id: CorrelationId,
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.sec_id, self.correlation_id)
    }
}

#[derive(Deserialize, Serialize, Debug, strum_macros::Display, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Submitted,
    Accepted,
    Rejected,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }
}

/// Fill reported by the exchange for one of our orders.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TradeReport {
    pub order_ref_id: String,
    pub order_sys_id: String,
    pub trade_id: String,
    pub price: f64,
    pub volume: u32,
    pub trade_date: String,
    pub trade_time: String,
    pub order_local_id: String,
    pub seq_no: i64,
}

/// Latest known state of one order.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OrderStatus {
    pub order_id: OrderId,
    pub state: OrderState,
    pub volume_traded: u32,
    pub volume_total: u32,
    pub session_id: Option<i32>,
    pub request_id: Option<i32>,
    /// Sequence number of the last applied order return.
    pub last_seq: Option<i64>,
    pub cancel_requested: bool,
    pub cancel_acknowledged: bool,
    pub fills: Vec<TradeReport>,
}

impl OrderStatus {
    pub fn submitted(order_id: OrderId, volume_total: u32, session_id: Option<i32>) -> Self {
        OrderStatus {
            order_id,
            state: OrderState::Submitted,
            volume_traded: 0,
            volume_total,
            session_id,
            request_id: None,
            last_seq: None,
            cancel_requested: false,
            cancel_acknowledged: false,
            fills: vec![],
        }
    }

    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }
}

/// Inbound callback from the exchange transport.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event")]
pub enum ExchangeEvent {
    LoggedIn {
        session_id: i32,
    },
    OrderSubmitted {
        correlation_id: CorrelationId,
        request_id: i32,
    },
    OrderActionTaken {
        correlation_id: CorrelationId,
        request_id: i32,
    },
    OrderReturn {
        order_ref_id: String,
        notify_seq: i32,
        status: NativeOrderStatus,
        volume_traded: u32,
        volume_total: u32,
        seq_no: i64,
    },
    TradeReturn(TradeReport),
}

/// What happened to one order, in the order it was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Submitted {
        request_id: i32,
    },
    Updated {
        state: OrderState,
        volume_traded: u32,
        volume_total: u32,
        seq_no: i64,
    },
    Trade(TradeReport),
    CancelAcknowledged {
        request_id: i32,
    },
}
