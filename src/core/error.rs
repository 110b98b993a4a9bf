use crate::model::OrderId;
use crate::pubsub::SubscriberId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("malformed instrument identifier {0:?}")]
    MalformedIdentifier(String),

    #[error("invalid subscriber: {0}")]
    InvalidSubscriber(String),

    #[error("subscriber {0} does not exist")]
    UnknownSubscriber(SubscriberId),

    #[error("order {0} is unknown or has been evicted")]
    UnknownOrder(OrderId),

    #[error("malformed tick {raw:?}: {reason}")]
    MalformedTick { raw: String, reason: String },

    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    #[error("missing configuration field {0}")]
    MissingConfiguration(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Config(#[from] confy::ConfyError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for BridgeError {
    fn from(err: redis::RedisError) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

impl BridgeError {
    pub(crate) fn malformed_tick(raw: &str, reason: impl ToString) -> Self {
        BridgeError::MalformedTick {
            raw: raw.to_string(),
            reason: reason.to_string(),
        }
    }
}
