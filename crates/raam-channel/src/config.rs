//! Per-operation configuration records.

use raam_ledger::{DEFAULT_DEPTH, DEFAULT_MWM};

/// Options for one publish.
#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// Index to publish at; defaults to the cursor.
    pub index: Option<u64>,
    /// Per-message password overriding the channel password as key basis.
    pub message_password: Option<String>,
    /// Publish in public mode: the cipher key becomes derivable from the
    /// ledger address alone.
    pub public: bool,
    /// Root of a follow-on channel to embed, as trytes.
    pub next_root: Option<String>,
    /// Proof-of-work depth, opaque to RAAM.
    pub depth: u8,
    /// Minimum weight magnitude, opaque to RAAM.
    pub mwm: u8,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            index: None,
            message_password: None,
            public: false,
            next_root: None,
            depth: DEFAULT_DEPTH,
            mwm: DEFAULT_MWM,
        }
    }
}

/// Options for constructing a [`crate::Reader`].
#[derive(Clone, Debug, Default)]
pub struct ReaderConfig {
    /// Channel height, when known up front; otherwise learned from the
    /// first verified message.
    pub height: Option<usize>,
    /// Channel security, when known up front.
    pub security: Option<usize>,
    /// Channel password, when the channel has one.
    pub channel_password: Option<String>,
}

/// Options for one range fetch. `index` wins over `start`/`end`; an absent
/// `end` probes forward until the first empty index.
#[derive(Clone, Debug, Default)]
pub struct FetchConfig {
    pub index: Option<u64>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    /// Per-message password for decryption.
    pub message_password: Option<String>,
}

/// Options for one live subscription over a range of indexes.
#[derive(Clone, Debug, Default)]
pub struct SubscribeConfig {
    /// First index to watch.
    pub start: u64,
    /// Last index to watch; absent means `start` alone.
    pub end: Option<u64>,
    /// When an index verifies, transparently subscribe its successor.
    pub follow: bool,
    /// Derive keys in public mode.
    pub public: bool,
    /// Per-message password for decryption.
    pub message_password: Option<String>,
}
