use crate::core::error::Result;
use crate::ctp::types::{Direction, NativeOrder, NativePriceType, OffsetFlag};
use crate::model::{to_native, OrderOffset, OrderRequest, OrderSide, OrderType};

/// How market orders are turned into marketable limit orders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketPricing {
    pub offset: f64,
    pub minimum_price: f64,
}

impl Default for MarketPricing {
    fn default() -> Self {
        MarketPricing {
            offset: 100.0,
            minimum_price: 1.0,
        }
    }
}

impl MarketPricing {
    pub fn marketable_price(&self, direction: Direction, price: f64) -> f64 {
        match direction {
            Direction::Buy => price + self.offset,
            Direction::Sell => self.minimum_price.max(price - self.offset),
        }
    }
}

/// The gateway never sends a true market order: a MARKET request becomes a
/// limit order priced `offset` through the reference price.
pub fn convert_to_native_order(order: &OrderRequest, pricing: &MarketPricing) -> Result<NativeOrder> {
    let native = to_native(&order.sec_id)?;
    let direction = match order.side {
        OrderSide::Buy => Direction::Buy,
        OrderSide::Sell => Direction::Sell,
    };
    let limit_price = match order.type_ {
        OrderType::Market => pricing.marketable_price(direction, order.price),
        OrderType::Limit => order.price,
    };
    let offset_flag = match order.offset {
        OrderOffset::Open => OffsetFlag::Open,
        OrderOffset::Close => OffsetFlag::Close,
        OrderOffset::CloseToday => OffsetFlag::CloseToday,
    };
    Ok(NativeOrder {
        instrument_id: native.instrument_id,
        exchange: native.exchange_code,
        direction,
        volume: order.volume,
        price_type: NativePriceType::LimitPrice,
        limit_price,
        offset_flag,
    })
}
