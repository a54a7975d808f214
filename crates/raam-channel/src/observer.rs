//! The read-observer capability.

use std::sync::Arc;

use crate::error::ChannelError;

/// A bundle that existed at an address but was not the message: recorded,
/// never fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedBundle {
    /// Bundle id.
    pub bundle: String,
    /// Why the bundle was passed over.
    pub reason: String,
}

/// One per-index outcome delivered to a [`ReadObserver`] or returned from
/// a fetch.
#[derive(Clone, Debug, Default)]
pub struct ReadEvent {
    /// The index this event is about.
    pub index: Option<u64>,
    /// The verified message, when one was recovered.
    pub message: Option<String>,
    /// Branch pointer carried by the message, as trytes.
    pub next_root: Option<String>,
    /// Channel root recovered from the message itself (public-mode reads).
    pub channel_root: Option<String>,
    /// Bundles at the address that were passed over, with reasons.
    pub skipped: Vec<SkippedBundle>,
    /// Per-index failure; other indexes are unaffected.
    pub error: Option<Arc<ChannelError>>,
}

/// Capability interface for live read notifications.
pub trait ReadObserver: Send + Sync {
    fn on_record(&self, event: ReadEvent);
}

impl<F> ReadObserver for F
where
    F: Fn(ReadEvent) + Send + Sync,
{
    fn on_record(&self, event: ReadEvent) {
        self(event)
    }
}
