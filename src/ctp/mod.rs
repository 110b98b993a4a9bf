pub mod ctp_order_gateway;
pub mod types;
mod utils;

pub use ctp_order_gateway::{MessageBusOrderTransport, OrderEventService};
pub use types::{Direction, NativeOrder, NativeOrderStatus, NativePriceType, OffsetFlag};
pub use utils::{convert_to_native_order, MarketPricing};
