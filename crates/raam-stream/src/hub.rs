//! The subscription hub: one upstream connection, many per-address
//! subscribers.
//!
//! Records arriving from the push stream are buffered per (address,
//! bundle id) until the bundle holds `last_index + 1` records, then sorted
//! by `current_index` and dispatched to every callback registered for the
//! address. The connection opens lazily with the first subscription and
//! closes when the last address is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use raam_codec::Record;

use crate::client::RecordStreamClient;
use crate::error::{StreamError, StreamResult};

/// Callback invoked with a complete, `current_index`-sorted bundle.
pub type BundleCallback = Arc<dyn Fn(Vec<Record>) + Send + Sync>;

/// Hub tuning knobs.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Most incomplete bundles buffered at once; the oldest is evicted
    /// beyond this.
    pub max_pending_bundles: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_pending_bundles: 64,
        }
    }
}

struct SubEntry {
    id: u64,
    callback: BundleCallback,
}

#[derive(Default)]
struct HubState {
    url: Option<String>,
    next_id: u64,
    subs: HashMap<String, Vec<SubEntry>>,
    /// Incomplete bundles in arrival order, keyed by (address, bundle id).
    pending: Vec<((String, String), Vec<Record>)>,
    pump: Option<JoinHandle<()>>,
}

struct HubInner {
    client: Arc<dyn RecordStreamClient>,
    config: HubConfig,
    state: Mutex<HubState>,
}

/// Multiplexer over one push-stream connection. Clone handles freely; all
/// clones share the connection and subscriber tables.
#[derive(Clone)]
pub struct SubscriptionHub {
    inner: Arc<HubInner>,
}

impl SubscriptionHub {
    pub fn new(client: Arc<dyn RecordStreamClient>) -> Self {
        Self::with_config(client, HubConfig::default())
    }

    pub fn with_config(client: Arc<dyn RecordStreamClient>, config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                client,
                config,
                state: Mutex::new(HubState::default()),
            }),
        }
    }

    /// Set the push-stream URL used when the connection is next opened.
    pub fn set_server_url(&self, url: &str) {
        let mut state = self.inner.state.lock().expect("hub lock poisoned");
        state.url = Some(url.to_string());
    }

    /// Register a callback for complete bundles at `address`, opening the
    /// upstream connection if this is the first live subscription.
    pub async fn subscribe(
        &self,
        address: &str,
        callback: BundleCallback,
    ) -> StreamResult<Subscription> {
        let (id, connect_url) = {
            let mut state = self
                .inner
                .state
                .lock()
                .map_err(|_| StreamError::LockPoisoned)?;
            let connect_url = if state.pump.is_none() {
                Some(state.url.clone().ok_or(StreamError::UrlNotSet)?)
            } else {
                None
            };
            state.next_id += 1;
            let id = state.next_id;
            state.subs.entry(address.to_string()).or_default().push(SubEntry {
                id,
                callback,
            });
            (id, connect_url)
        };

        let subscription = Subscription {
            inner: Arc::clone(&self.inner),
            address: address.to_string(),
            id,
            active: AtomicBool::new(true),
        };

        if let Some(url) = connect_url {
            let receiver = match self.inner.client.connect(&url).await {
                Ok(receiver) => receiver,
                Err(e) => {
                    subscription.unsubscribe();
                    return Err(e);
                }
            };
            let mut state = self
                .inner
                .state
                .lock()
                .map_err(|_| StreamError::LockPoisoned)?;
            if state.pump.is_none() {
                let inner = Arc::clone(&self.inner);
                state.pump = Some(tokio::spawn(async move {
                    let mut receiver = receiver;
                    while let Some(record) = receiver.recv().await {
                        ingest(&inner, record);
                    }
                    debug!("push stream ended");
                }));
                info!(url = %url, "push stream connected");
            }
        }

        Ok(subscription)
    }

    /// Number of live callbacks across all addresses.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|state| state.subs.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Whether the upstream connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.inner
            .state
            .lock()
            .map(|state| state.pump.is_some())
            .unwrap_or(false)
    }
}

fn ingest(inner: &Arc<HubInner>, record: Record) {
    let ready = {
        let mut state = inner.state.lock().expect("hub lock poisoned");
        if !state.subs.contains_key(&record.address) {
            return;
        }

        let key = (record.address.clone(), record.bundle.clone());
        let position = match state.pending.iter().position(|(k, _)| *k == key) {
            Some(position) => position,
            None => {
                if state.pending.len() >= inner.config.max_pending_bundles {
                    let ((address, bundle), _) = state.pending.remove(0);
                    warn!(%address, %bundle, "evicted incomplete bundle");
                }
                state.pending.push((key.clone(), Vec::new()));
                state.pending.len() - 1
            }
        };

        let group = &mut state.pending[position].1;
        if group.iter().any(|r| r.current_index == record.current_index) {
            return;
        }
        let complete_len = record.last_index + 1;
        group.push(record.clone());

        if group.len() == complete_len {
            let (_, mut bundle) = state.pending.remove(position);
            bundle.sort_by_key(|r| r.current_index);
            let callbacks: Vec<BundleCallback> = state
                .subs
                .get(&record.address)
                .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
                .unwrap_or_default();
            Some((bundle, callbacks))
        } else {
            None
        }
    };

    if let Some((bundle, callbacks)) = ready {
        debug!(
            address = %bundle[0].address,
            bundle = %bundle[0].bundle,
            records = bundle.len(),
            subscribers = callbacks.len(),
            "bundle complete"
        );
        for callback in callbacks {
            callback(bundle.clone());
        }
    }
}

/// Handle for one registered callback. `unsubscribe` is idempotent; the
/// upstream connection closes when the last subscription goes.
pub struct Subscription {
    inner: Arc<HubInner>,
    address: String,
    id: u64,
    active: AtomicBool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("address", &self.address)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    /// The subscribed address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.state.lock().expect("hub lock poisoned");
        if let Some(entries) = state.subs.get_mut(&self.address) {
            entries.retain(|entry| entry.id != self.id);
            if entries.is_empty() {
                state.subs.remove(&self.address);
                let address = self.address.clone();
                state.pending.retain(|((a, _), _)| *a != address);
            }
        }
        if state.subs.is_empty() {
            if let Some(pump) = state.pump.take() {
                pump.abort();
                info!("push stream closed");
            }
        }
    }
}
