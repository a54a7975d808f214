//! The push-stream boundary and its in-memory implementation.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use raam_codec::Record;

use crate::error::{StreamError, StreamResult};

/// A client that delivers raw record arrivals from a remote push stream.
#[async_trait]
pub trait RecordStreamClient: Send + Sync {
    /// Open a connection and return the incoming record feed. Dropping the
    /// receiver closes the connection.
    async fn connect(&self, url: &str) -> StreamResult<mpsc::Receiver<Record>>;
}

/// In-memory push stream fed by a broadcast channel, typically the tap of
/// an in-memory ledger.
pub struct ChannelStreamClient {
    feed: broadcast::Sender<Record>,
}

impl ChannelStreamClient {
    /// Create a client with a fresh feed of the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self { feed }
    }

    /// The feed handle; hand a clone to whatever produces records.
    pub fn feed(&self) -> broadcast::Sender<Record> {
        self.feed.clone()
    }
}

#[async_trait]
impl RecordStreamClient for ChannelStreamClient {
    async fn connect(&self, url: &str) -> StreamResult<mpsc::Receiver<Record>> {
        if url.is_empty() {
            return Err(StreamError::Connection("empty URL".into()));
        }
        let mut upstream = self.feed.subscribe();
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Ok(record) = upstream.recv().await {
                if tx.send(record).await.is_err() {
                    break;
                }
            }
            debug!("in-memory stream connection closed");
        });
        Ok(rx)
    }
}
