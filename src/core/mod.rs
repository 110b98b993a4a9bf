pub mod config;
pub mod error;
pub mod orders;
pub mod session;

pub use error::{BridgeError, Result};
pub use orders::{OrderGateway, OrderTransport};
pub use session::{ExchangeSession, PassthroughSession};
