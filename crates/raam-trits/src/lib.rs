//! Balanced-ternary foundation for RAAM.
//!
//! Every other RAAM crate depends on `raam-trits`. It provides:
//!
//! - [`Trit`] — a balanced ternary digit in {−1, 0, +1}
//! - trit ↔ tryte conversion over the 27-symbol alphabet `9A..Z`
//! - carry-free saturating trit arithmetic ([`add_trits`] / [`subtract_trits`])
//! - integer ↔ trit and integer ↔ tryte codecs
//! - tryte-string validation

pub mod error;
pub mod trit;
pub mod tryte;

pub use error::TritError;
pub use trit::{
    add_int, add_trits, int_to_trits, pad_trits, subtract_trits, trit_sum, trits_to_int,
    validate_trits, Trit,
};
pub use tryte::{
    int_to_trytes, trits_to_trytes, trytes_to_int, trytes_to_trits, validate_trytes,
    TRYTE_ALPHABET, TRITS_PER_TRYTE,
};
