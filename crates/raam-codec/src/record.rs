//! Ledger record shapes.

use serde::{Deserialize, Serialize};

/// Width of one record's message fragment, in trytes.
pub const FRAG_TRYTES: usize = 2187;

/// Width of an address, in trytes.
pub const ADDRESS_TRYTES: usize = 81;

/// A record attached to the ledger: one 2187-tryte fragment of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Bundle identifier shared by every record of one submission.
    pub bundle: String,
    /// Position of this record within its bundle.
    pub current_index: usize,
    /// Highest `current_index` in the bundle.
    pub last_index: usize,
    /// Address the bundle is attached at, 81 trytes.
    pub address: String,
    /// The 2187-tryte message fragment.
    pub signature_message_fragment: String,
    /// Transferred value; always zero for RAAM records.
    pub value: i64,
    /// Record tag, 27 trytes.
    pub tag: String,
    /// Ledger attachment timestamp, milliseconds.
    pub attachment_timestamp: u64,
}

/// A record prepared locally, before the ledger assigns bundle fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    /// Address to attach at, 81 trytes.
    pub address: String,
    /// The 2187-tryte message fragment.
    pub message: String,
    /// Transferred value; always zero for RAAM records.
    pub value: i64,
    /// Record tag, 27 trytes.
    pub tag: String,
}

/// Group loose records into bundles: records sharing a bundle id are
/// collected together and sorted by `current_index`; bundles are ordered by
/// earliest attachment timestamp so the oldest attachment is tried first.
pub fn bundles_from_records(records: Vec<Record>) -> Vec<Vec<Record>> {
    let mut by_bundle: Vec<(String, Vec<Record>)> = Vec::new();
    for record in records {
        match by_bundle.iter_mut().find(|(id, _)| *id == record.bundle) {
            Some((_, group)) => group.push(record),
            None => by_bundle.push((record.bundle.clone(), vec![record])),
        }
    }
    for (_, group) in by_bundle.iter_mut() {
        group.sort_by_key(|r| r.current_index);
    }
    by_bundle.sort_by_key(|(_, group)| {
        group
            .iter()
            .map(|r| r.attachment_timestamp)
            .min()
            .unwrap_or(u64::MAX)
    });
    by_bundle.into_iter().map(|(_, group)| group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bundle: &str, current_index: usize, timestamp: u64) -> Record {
        Record {
            bundle: bundle.into(),
            current_index,
            last_index: 2,
            address: "A".repeat(ADDRESS_TRYTES),
            signature_message_fragment: "9".repeat(FRAG_TRYTES),
            value: 0,
            tag: "9".repeat(27),
            attachment_timestamp: timestamp,
        }
    }

    #[test]
    fn groups_by_bundle_and_sorts_records() {
        let records = vec![
            record("BUNDLEB", 1, 200),
            record("BUNDLEA", 2, 100),
            record("BUNDLEB", 0, 200),
            record("BUNDLEA", 0, 100),
            record("BUNDLEA", 1, 100),
        ];
        let bundles = bundles_from_records(records);
        assert_eq!(bundles.len(), 2);
        // Oldest attachment first.
        assert_eq!(bundles[0][0].bundle, "BUNDLEA");
        assert_eq!(
            bundles[0].iter().map(|r| r.current_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(bundles[1][0].bundle, "BUNDLEB");
    }

    #[test]
    fn record_serde_roundtrip() {
        let r = record("BUNDLEA", 0, 42);
        let json = serde_json::to_string(&r).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(r, parsed);
    }
}
