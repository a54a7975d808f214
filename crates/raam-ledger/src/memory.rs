use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use raam_codec::{Record, RecordDraft};
use raam_trits::int_to_trytes;

use crate::error::{LedgerError, LedgerResult};
use crate::traits::LedgerClient;

/// In-memory ledger for tests, demos, and embedding.
///
/// Submissions are assigned a bundle id, record indices, and a
/// monotonically increasing attachment timestamp. An optional tap
/// broadcasts every attached record, which is how the in-memory record
/// stream observes the ledger.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
    tap: Option<broadcast::Sender<Record>>,
}

#[derive(Default)]
struct LedgerState {
    bundles: HashMap<String, Vec<Record>>,
    by_address: HashMap<String, Vec<String>>,
    next_bundle: u64,
    clock: u64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            tap: None,
        }
    }

    /// A ledger that broadcasts every attached record into `tap`.
    pub fn with_tap(tap: broadcast::Sender<Record>) -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            tap: Some(tap),
        }
    }

    /// Total number of attached bundles.
    pub fn bundle_count(&self) -> usize {
        self.inner.read().map(|s| s.bundles.len()).unwrap_or(0)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn find_by_address(&self, address: &str) -> LedgerResult<Vec<String>> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(state
            .by_address
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_records(&self, bundles: &[String]) -> LedgerResult<Vec<Record>> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(bundles
            .iter()
            .filter_map(|id| state.bundles.get(id))
            .flat_map(|records| records.iter().cloned())
            .collect())
    }

    async fn submit(
        &self,
        drafts: &[RecordDraft],
        _depth: u8,
        _mwm: u8,
    ) -> LedgerResult<Vec<Record>> {
        if drafts.is_empty() {
            return Err(LedgerError::SubmitRejected("empty bundle".into()));
        }

        let records = {
            let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
            state.next_bundle += 1;
            state.clock += 1000;
            let bundle = int_to_trytes(state.next_bundle, 81)
                .map_err(|e| LedgerError::SubmitRejected(e.to_string()))?;
            let timestamp = state.clock;
            let last_index = drafts.len() - 1;

            let records: Vec<Record> = drafts
                .iter()
                .enumerate()
                .map(|(current_index, draft)| Record {
                    bundle: bundle.clone(),
                    current_index,
                    last_index,
                    address: draft.address.clone(),
                    signature_message_fragment: draft.message.clone(),
                    value: draft.value,
                    tag: draft.tag.clone(),
                    attachment_timestamp: timestamp,
                })
                .collect();

            for record in &records {
                let entry = state.by_address.entry(record.address.clone()).or_default();
                if !entry.contains(&bundle) {
                    entry.push(bundle.clone());
                }
            }
            state.bundles.insert(bundle.clone(), records.clone());
            records
        };

        if let Some(tap) = &self.tap {
            for record in &records {
                // No receivers is fine; the tap is advisory.
                let _ = tap.send(record.clone());
            }
        }

        debug!(
            bundle = %records[0].bundle,
            address = %records[0].address,
            records = records.len(),
            "bundle attached"
        );
        Ok(records)
    }
}
