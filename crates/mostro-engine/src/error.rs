//! Engine error types.

use thiserror::Error;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Key(#[from] mostro_core::KeyError),

    #[error("trade limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("price deviation too large: {0}")]
    PriceDeviation(String),

    #[error(transparent)]
    Relay(#[from] mostro_client::ClientError),

    #[error(transparent)]
    Wrap(#[from] mostro_core::WrapError),

    #[error(transparent)]
    Chat(#[from] mostro_core::ChatError),

    #[error(transparent)]
    Message(#[from] mostro_core::MessageError),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("state file error: {0}")]
    State(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    StateFormat(#[from] serde_json::Error),
}

/// Engine result type.
pub type Result<T> = std::result::Result<T, EngineError>;
