use thiserror::Error;

/// Errors produced while assembling or parsing ledger messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("message is not a valid tryte string")]
    InvalidMessage,

    #[error("index {index} outside channel capacity {capacity}")]
    InvalidIndex { index: u64, capacity: u64 },

    #[error("invalid height {0}; expected 1..=26")]
    InvalidHeight(usize),

    #[error("invalid security level {0}; expected 1..=4")]
    InvalidSecurityLevel(usize),

    #[error("message length {0} exceeds the header field")]
    InvalidLength(usize),

    #[error("bundle too short: {records} records, need {required}")]
    ShortMessage { records: usize, required: usize },

    #[error("header index {found} does not match expected index {expected}")]
    WrongIndex { expected: u64, found: u64 },

    #[error("header height {found} does not match channel height {expected}")]
    WrongHeight { expected: usize, found: usize },

    #[error("header security {found} does not match channel security {expected}")]
    WrongSecurity { expected: usize, found: usize },

    #[error("public mode is not allowed on a password-protected channel")]
    PublicNotAllowed,

    #[error("no cipher key available: index plus channel root or a password required")]
    KeyUnavailable,

    #[error(transparent)]
    Trits(#[from] raam_trits::TritError),

    #[error(transparent)]
    Crypto(#[from] raam_crypto::CryptoError),
}

/// Convenience alias used throughout the codec crate.
pub type CodecResult<T> = Result<T, CodecError>;
