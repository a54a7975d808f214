//! Ledger-client boundary for RAAM.
//!
//! The ledger itself is an external collaborator; this crate pins down the
//! operations RAAM needs from it (`find_by_address`, `get_records`,
//! `submit`) and ships [`InMemoryLedger`] for tests, demos, and embedding.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryLedger;
pub use traits::{LedgerClient, DEFAULT_DEPTH, DEFAULT_MWM};
