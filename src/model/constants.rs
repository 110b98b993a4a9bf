use serde::{Deserialize, Serialize};

use strum_macros::AsRefStr;
pub use strum_macros::EnumString;

/// Exchange suffixes whose native instrument codes are uppercase.
pub const UPPERCASE_EXCHANGES: [&str; 2] = ["XZCE", "CCFX"];

/// Record delimiter of raw market-data messages.
pub const TICK_FIELD_DELIMITER: char = ',';
pub const TICK_TIMESTAMP_FORMAT: &str = "%Y%m%d %H:%M:%S";

#[derive(
    Serialize,
    Deserialize,
    Debug,
    strum_macros::Display,
    EnumString,
    AsRefStr,
    Clone,
    PartialOrd,
    PartialEq,
)]
pub enum PublishChannel {
    OrderRequest,
    CancelOrder,
    OrderEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn channel_names_round_trip_through_strum() {
        assert_eq!(PublishChannel::OrderRequest.as_ref(), "OrderRequest");
        assert_eq!(
            PublishChannel::from_str("OrderEvent").unwrap(),
            PublishChannel::OrderEvent
        );
    }
}
