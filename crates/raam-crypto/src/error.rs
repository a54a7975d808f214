use thiserror::Error;

/// Errors produced by the cryptographic core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid security level {0}; expected 1..=4")]
    InvalidSecurityLevel(usize),

    #[error("invalid tree height {0}; expected 1..=26")]
    InvalidHeight(usize),

    #[error("invalid length: expected {expected} trits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("merkle path authentication failed")]
    AuthenticationFailed,

    #[error("incomplete tree: {0}")]
    IncompleteTree(String),

    #[error(transparent)]
    Trits(#[from] raam_trits::TritError),
}

/// Convenience alias used throughout the crypto crate.
pub type CryptoResult<T> = Result<T, CryptoError>;
