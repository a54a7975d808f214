use thiserror::Error;

/// Errors produced by publisher and reader operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("message is not a valid tryte string")]
    InvalidMessage,

    #[error("index {index} outside channel capacity {capacity}")]
    InvalidIndex { index: u64, capacity: u64 },

    #[error("index {0} is already published")]
    IndexUsed(u64),

    #[error("signature verification failed at index {0}")]
    VerificationFailed(u64),

    #[error("merkle authentication failed at index {0}")]
    AuthenticationFailed(u64),

    #[error("channel state lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Codec(#[from] raam_codec::CodecError),

    #[error(transparent)]
    Crypto(#[from] raam_crypto::CryptoError),

    #[error(transparent)]
    Ledger(#[from] raam_ledger::LedgerError),

    #[error(transparent)]
    Stream(#[from] raam_stream::StreamError),

    #[error(transparent)]
    Trits(#[from] raam_trits::TritError),
}

/// Convenience alias used throughout the channel crate.
pub type ChannelResult<T> = Result<T, ChannelError>;
