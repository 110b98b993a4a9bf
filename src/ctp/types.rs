use crate::model::{CorrelationId, OrderState};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

macro_rules! native_code {
    ($name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        #[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
        #[serde(into = "char", try_from = "char")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn code(self) -> char {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl From<$name> for char {
            fn from(value: $name) -> char {
                value.code()
            }
        }

        impl TryFrom<char> for $name {
            type Error = String;

            fn try_from(code: char) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("unknown {} code {:?}", stringify!($name), other)),
                }
            }
        }
    };
}

native_code!(Direction {
    Buy = '0',
    Sell = '1',
});

native_code!(OffsetFlag {
    Open = '0',
    Close = '1',
    ForceClose = '2',
    CloseToday = '3',
    CloseYesterday = '4',
});

native_code!(NativePriceType {
    AnyPrice = '1',
    LimitPrice = '2',
    BestPrice = '3',
});

/// Order in the exchange's own vocabulary, ready for the order transport.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NativeOrder {
    pub instrument_id: String,
    pub exchange: Option<char>,
    pub direction: Direction,
    pub volume: u32,
    pub price_type: NativePriceType,
    pub limit_price: f64,
    pub offset_flag: OffsetFlag,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NativeOrderRequest {
    pub correlation_id: CorrelationId,
    pub order: NativeOrder,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NativeCancelRequest {
    pub correlation_id: CorrelationId,
}

pub const ORDER_STATUS_ALL_TRADED: char = '0';
pub const ORDER_STATUS_PART_TRADED_QUEUEING: char = '1';
pub const ORDER_STATUS_PART_TRADED_NOT_QUEUEING: char = '2';
pub const ORDER_STATUS_NO_TRADE_QUEUEING: char = '3';
pub const ORDER_STATUS_NO_TRADE_NOT_QUEUEING: char = '4';
pub const ORDER_STATUS_CANCELED: char = '5';
pub const ORDER_STATUS_UNKNOWN: char = 'a';

pub const SUBMIT_STATUS_INSERT_SUBMITTED: char = '0';
pub const SUBMIT_STATUS_ACCEPTED: char = '3';
pub const SUBMIT_STATUS_INSERT_REJECTED: char = '4';

/// Status pair carried by an order return.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeOrderStatus {
    pub order_status: char,
    pub submit_status: char,
}

impl NativeOrderStatus {
    pub fn new(order_status: char, submit_status: char) -> Self {
        NativeOrderStatus {
            order_status,
            submit_status,
        }
    }

    /// Lifecycle state this status maps to, `None` when it carries no
    /// lifecycle information (unknown/not yet touched).
    pub fn lifecycle(&self) -> Option<OrderState> {
        match self.order_status {
            ORDER_STATUS_ALL_TRADED => Some(OrderState::Filled),
            ORDER_STATUS_PART_TRADED_QUEUEING | ORDER_STATUS_PART_TRADED_NOT_QUEUEING => {
                Some(OrderState::PartiallyFilled)
            }
            ORDER_STATUS_NO_TRADE_QUEUEING | ORDER_STATUS_NO_TRADE_NOT_QUEUEING => {
                Some(OrderState::Accepted)
            }
            ORDER_STATUS_CANCELED if self.submit_status == SUBMIT_STATUS_INSERT_REJECTED => {
                Some(OrderState::Rejected)
            }
            ORDER_STATUS_CANCELED => Some(OrderState::Cancelled),
            _ => None,
        }
    }
}
