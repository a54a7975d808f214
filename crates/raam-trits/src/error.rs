use thiserror::Error;

/// Errors produced by ternary conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TritError {
    #[error("invalid tryte character: {0:?}")]
    InvalidTryte(char),

    #[error("invalid trit value: {0}")]
    InvalidTrit(i8),

    #[error("trit length {0} is not a multiple of 3")]
    NotTryteAligned(usize),

    #[error("value {value} does not fit in {trytes} trytes")]
    ValueOutOfRange { value: u64, trytes: usize },
}
