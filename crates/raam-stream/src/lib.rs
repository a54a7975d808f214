//! Live record delivery for RAAM.
//!
//! The push stream itself is an external collaborator reached through
//! [`RecordStreamClient`]. [`SubscriptionHub`] multiplexes one upstream
//! connection across many per-address subscribers, reassembling records
//! into complete bundles before dispatch. [`ChannelStreamClient`] is the
//! in-memory implementation used by tests and local setups.

pub mod client;
pub mod error;
pub mod hub;

pub use client::{ChannelStreamClient, RecordStreamClient};
pub use error::{StreamError, StreamResult};
pub use hub::{BundleCallback, HubConfig, Subscription, SubscriptionHub};
