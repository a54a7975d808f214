use thiserror::Error;

/// Errors produced by the subscription layer.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("no server URL set; call set_server_url before subscribing")]
    UrlNotSet,

    #[error("stream connection failed: {0}")]
    Connection(String),

    #[error("hub state lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the stream crate.
pub type StreamResult<T> = Result<T, StreamError>;
