pub mod constants;
mod instrument;
pub mod market_data_model;
mod order_data_model;

pub use instrument::{
    exchange_code, native_instrument_id, to_native, NativeInstrument, SECURITY_ID_DELIMITER,
};
pub use market_data_model::{decode_tick, Tick, TickBatch, TopicMap};
pub use order_data_model::{
    CorrelationId, ExchangeEvent, OrderEvent, OrderId, OrderOffset, OrderRequest, OrderSide,
    OrderState, OrderStatus, OrderType, TradeReport,
};
