use async_trait::async_trait;

use raam_codec::{Record, RecordDraft};

use crate::error::LedgerResult;

/// Default proof-of-work depth; opaque to RAAM.
pub const DEFAULT_DEPTH: u8 = 3;

/// Default minimum weight magnitude; opaque to RAAM.
pub const DEFAULT_MWM: u8 = 14;

/// The operations RAAM requires from a ledger node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Bundle ids of every bundle attached at an address.
    async fn find_by_address(&self, address: &str) -> LedgerResult<Vec<String>>;

    /// All records belonging to the given bundles.
    async fn get_records(&self, bundles: &[String]) -> LedgerResult<Vec<Record>>;

    /// Attach a prepared bundle; returns the records with ledger-assigned
    /// bundle id, indices, and attachment timestamps.
    async fn submit(
        &self,
        drafts: &[RecordDraft],
        depth: u8,
        mwm: u8,
    ) -> LedgerResult<Vec<Record>>;
}
