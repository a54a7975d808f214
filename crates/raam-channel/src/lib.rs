//! Channel state machines for RAAM.
//!
//! [`Publisher`] owns the key tree and cursor and drives message
//! composition and submission. [`Reader`] fetches, verifies, and caches
//! messages by index, and can subscribe to live arrivals through a
//! [`raam_stream::SubscriptionHub`]. Both speak to the ledger through the
//! [`raam_ledger::LedgerClient`] boundary.

pub mod config;
pub mod error;
pub mod observer;
pub mod publisher;
pub mod reader;

pub use config::{FetchConfig, PublishConfig, ReaderConfig, SubscribeConfig};
pub use error::{ChannelError, ChannelResult};
pub use observer::{ReadEvent, ReadObserver, SkippedBundle};
pub use publisher::{PreparedMessage, PublishedMessage, Publisher};
pub use reader::{PublicMessage, Reader, ReaderSubscription};
