use thiserror::Error;

/// Errors produced by ledger-client operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("submission rejected: {0}")]
    SubmitRejected(String),

    #[error("ledger state lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the ledger crate.
pub type LedgerResult<T> = Result<T, LedgerError>;
