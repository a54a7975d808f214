//! On-ledger message codec for RAAM.
//!
//! This crate owns the record-level wire format: address derivation,
//! per-index cipher keys, the 11-tryte framing header, assembly of a
//! message into fixed 2187-tryte records, and the inverse parse path with
//! its skipped-bundle discipline.

pub mod address;
pub mod assemble;
pub mod error;
pub mod header;
pub mod parse;
pub mod record;

pub use address::{derive_address, message_key, public_password};
pub use assemble::{assemble, signing_input, AssembleRequest, RECORD_TAG};
pub use error::{CodecError, CodecResult};
pub use header::{Header, HEADER_TRYTES, INDEX_TRYTES, LENGTH_TRYTES};
pub use parse::{parse_bundle, ParseOptions, ParsedMessage};
pub use record::{bundles_from_records, Record, RecordDraft, ADDRESS_TRYTES, FRAG_TRYTES};
