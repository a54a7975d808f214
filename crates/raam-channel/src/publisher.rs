//! The publishing side of a channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use raam_codec::{assemble, signing_input, AssembleRequest, Record, RecordDraft};
use raam_crypto::{ots, MerkleTree};
use raam_ledger::LedgerClient;
use raam_trits::{trits_to_trytes, trytes_to_trits, validate_trytes};

use crate::config::PublishConfig;
use crate::error::{ChannelError, ChannelResult};

/// A message composed and signed but not yet submitted. The two-phase API
/// lets a caller inspect or postpone submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreparedMessage {
    pub index: u64,
    pub message: String,
    pub next_root: Option<String>,
    pub address: String,
    pub records: Vec<RecordDraft>,
    pub depth: u8,
    pub mwm: u8,
}

/// The outcome of a successful submission.
#[derive(Clone, Debug)]
pub struct PublishedMessage {
    pub index: u64,
    pub address: String,
    pub bundle: String,
    pub records: Vec<Record>,
}

/// Owns the channel key tree and cursor; composes, signs, and submits
/// messages.
pub struct Publisher {
    tree: MerkleTree,
    root_trytes: String,
    channel_password: Option<String>,
    ledger: Arc<dyn LedgerClient>,
    cursor: u64,
    messages: BTreeMap<u64, String>,
    branches: BTreeMap<u64, String>,
}

impl Publisher {
    /// Wrap a constructed tree. The channel password, when given, scopes
    /// both addresses and default cipher keys for the channel's lifetime.
    pub fn new(
        tree: MerkleTree,
        channel_password: Option<String>,
        ledger: Arc<dyn LedgerClient>,
    ) -> ChannelResult<Self> {
        if let Some(password) = &channel_password {
            validate_trytes(password)?;
        }
        let root_trytes = trits_to_trytes(tree.root())?;
        Ok(Self {
            tree,
            root_trytes,
            channel_password,
            ledger,
            cursor: 0,
            messages: BTreeMap::new(),
            branches: BTreeMap::new(),
        })
    }

    /// The channel root as 81·security trytes.
    pub fn channel_root(&self) -> &str {
        &self.root_trytes
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Next free index.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Indexes left before the tree is exhausted.
    pub fn remaining(&self) -> u64 {
        self.tree.capacity() - self.cursor
    }

    /// Local mirror of a published message.
    pub fn message(&self, index: u64) -> Option<&str> {
        self.messages.get(&index).map(String::as_str)
    }

    /// Branch pointer embedded at an index, if any.
    pub fn branch(&self, index: u64) -> Option<&str> {
        self.branches.get(&index).map(String::as_str)
    }

    /// Compose and sign a message, stopping before submission.
    pub fn create_message_transfers(
        &self,
        message: &str,
        config: &PublishConfig,
    ) -> ChannelResult<PreparedMessage> {
        let index = config.index.unwrap_or(self.cursor);
        let capacity = self.tree.capacity();
        if index >= capacity {
            return Err(ChannelError::InvalidIndex { index, capacity });
        }
        if index < self.cursor || self.messages.contains_key(&index) {
            return Err(ChannelError::IndexUsed(index));
        }
        if validate_trytes(message).is_err() {
            return Err(ChannelError::InvalidMessage);
        }

        let next_root = config
            .next_root
            .as_deref()
            .map(trytes_to_trits)
            .transpose()?;

        let leaf = self.tree.leaf(index)?;
        let auth_path = self.tree.auth_path(index)?;

        let input = signing_input(message, index, &leaf.public, next_root.as_deref(), &auth_path)?;
        let digest = ots::message_digest(&input, self.tree.security())?;
        let signature = ots::sign(&leaf.private, &digest)?;

        let records = assemble(&AssembleRequest {
            message,
            index,
            height: self.tree.height(),
            security: self.tree.security(),
            channel_root: self.tree.root(),
            channel_password: self.channel_password.as_deref(),
            message_password: config.message_password.as_deref(),
            public_mode: config.public,
            verifying_key: &leaf.public,
            auth_path: &auth_path,
            next_root: next_root.as_deref(),
            signature: &signature,
        })?;

        let address = records
            .first()
            .map(|r| r.address.clone())
            .unwrap_or_default();
        Ok(PreparedMessage {
            index,
            message: message.to_string(),
            next_root: config.next_root.clone(),
            address,
            records,
            depth: config.depth,
            mwm: config.mwm,
        })
    }

    /// Submit previously prepared records, then record the message locally
    /// and advance the cursor.
    pub async fn publish_message_transfers(
        &mut self,
        prepared: PreparedMessage,
    ) -> ChannelResult<PublishedMessage> {
        if prepared.index < self.cursor || self.messages.contains_key(&prepared.index) {
            return Err(ChannelError::IndexUsed(prepared.index));
        }

        let records = self
            .ledger
            .submit(&prepared.records, prepared.depth, prepared.mwm)
            .await?;
        let bundle = records
            .first()
            .map(|r| r.bundle.clone())
            .unwrap_or_default();

        self.messages.insert(prepared.index, prepared.message);
        if let Some(next_root) = prepared.next_root {
            self.branches.insert(prepared.index, next_root);
        }
        self.cursor = self.cursor.max(prepared.index + 1);

        info!(
            index = prepared.index,
            address = %prepared.address,
            bundle = %bundle,
            records = records.len(),
            "message published"
        );
        Ok(PublishedMessage {
            index: prepared.index,
            address: prepared.address,
            bundle,
            records,
        })
    }

    /// Compose, sign, and submit in one step.
    pub async fn publish(
        &mut self,
        message: &str,
        config: &PublishConfig,
    ) -> ChannelResult<PublishedMessage> {
        let prepared = self.create_message_transfers(message, config)?;
        self.publish_message_transfers(prepared).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raam_crypto::TreeOptions;
    use raam_ledger::InMemoryLedger;

    fn publisher(height: usize, password: Option<&str>) -> Publisher {
        let seed = trytes_to_trits(&"A".repeat(81)).unwrap();
        let tree = MerkleTree::generate(
            &seed,
            &TreeOptions {
                height,
                security: 1,
                offset: 0,
            },
        )
        .unwrap();
        Publisher::new(
            tree,
            password.map(String::from),
            Arc::new(InMemoryLedger::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publish_advances_cursor_and_mirrors_message() {
        let mut publisher = publisher(1, None);
        assert_eq!(publisher.cursor(), 0);

        let published = publisher
            .publish("ONE", &PublishConfig::default())
            .await
            .unwrap();
        assert_eq!(published.index, 0);
        assert_eq!(published.records.len(), 2);
        assert_eq!(publisher.cursor(), 1);
        assert_eq!(publisher.message(0), Some("ONE"));
        assert_eq!(publisher.remaining(), 1);
    }

    #[tokio::test]
    async fn republishing_an_index_is_refused() {
        let mut publisher = publisher(1, None);
        publisher
            .publish("ONE", &PublishConfig::default())
            .await
            .unwrap();
        let err = publisher
            .publish(
                "AGAIN",
                &PublishConfig {
                    index: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::IndexUsed(0)));
    }

    #[tokio::test]
    async fn index_beyond_capacity_is_refused() {
        let publisher = publisher(1, None);
        let err = publisher
            .create_message_transfers(
                "FAR",
                &PublishConfig {
                    index: Some(2),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidIndex {
                index: 2,
                capacity: 2
            }
        ));
    }

    #[tokio::test]
    async fn non_tryte_message_is_refused() {
        let publisher = publisher(1, None);
        let err = publisher
            .create_message_transfers("hello!", &PublishConfig::default())
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage));
    }

    #[tokio::test]
    async fn public_mode_with_channel_password_is_refused() {
        let publisher = publisher(1, Some("PASSWORD"));
        let err = publisher
            .create_message_transfers(
                "OPEN",
                &PublishConfig {
                    public: true,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Codec(raam_codec::CodecError::PublicNotAllowed)
        ));
    }

    #[tokio::test]
    async fn two_phase_publish_resumes_from_prepared_records() {
        let mut publisher = publisher(1, None);
        let prepared = publisher
            .create_message_transfers("LATER", &PublishConfig::default())
            .unwrap();
        assert_eq!(publisher.cursor(), 0, "preparation must not move the cursor");

        // Prepared messages survive serialization between the phases.
        let json = serde_json::to_string(&prepared).unwrap();
        let restored: PreparedMessage = serde_json::from_str(&json).unwrap();

        let published = publisher.publish_message_transfers(restored).await.unwrap();
        assert_eq!(published.index, 0);
        assert_eq!(publisher.cursor(), 1);
    }

    #[tokio::test]
    async fn branch_pointer_is_mirrored() {
        let mut publisher = publisher(1, None);
        let next_root = "C".repeat(81);
        publisher
            .publish(
                "FORK",
                &PublishConfig {
                    next_root: Some(next_root.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(publisher.branch(0), Some(next_root.as_str()));
    }
}
