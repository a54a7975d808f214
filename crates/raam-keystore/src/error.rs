use thiserror::Error;

/// Errors produced by key-file persistence.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed key file: {0}")]
    Malformed(String),

    #[error(transparent)]
    Trits(#[from] raam_trits::TritError),

    #[error(transparent)]
    Crypto(#[from] raam_crypto::CryptoError),
}

/// Convenience alias used throughout the keystore crate.
pub type KeystoreResult<T> = Result<T, KeystoreError>;
