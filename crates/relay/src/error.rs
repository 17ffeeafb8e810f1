use thiserror::Error;

use crate::topic::TopicError;

/// Errors that can occur in the relay fabric.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no reply after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
