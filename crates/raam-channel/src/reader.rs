//! The reading side of a channel.
//!
//! A reader owns write-once caches keyed by index and coalesces three
//! sources into them: explicit range fetches, open-ended sync walks, and
//! live subscription arrivals. Verification is identical on every path:
//! recompute the signed digest, check the one-time signature, then
//! authenticate the leaf against the channel root.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use raam_codec::{
    bundles_from_records, derive_address, parse_bundle, signing_input, CodecError, ParseOptions,
    Record,
};
use raam_crypto::{ots, recover_root, verify_path};
use raam_ledger::LedgerClient;
use raam_stream::{BundleCallback, Subscription, SubscriptionHub};
use raam_trits::{trits_to_trytes, trytes_to_trits, validate_trytes, Trit};

use crate::config::{FetchConfig, ReaderConfig, SubscribeConfig};
use crate::error::{ChannelError, ChannelResult};
use crate::observer::{ReadEvent, ReadObserver, SkippedBundle};

/// A message recovered knowing only its ledger address, channel root
/// included.
#[derive(Clone, Debug)]
pub struct PublicMessage {
    pub index: u64,
    pub message: String,
    pub channel_root: String,
    pub next_root: Option<String>,
}

#[derive(Default)]
struct ReaderState {
    height: Option<usize>,
    security: Option<usize>,
    messages: BTreeMap<u64, String>,
    branches: BTreeMap<u64, String>,
    cursor: u64,
    subscribed: HashSet<u64>,
}

/// Verifying reader over one channel. Clones share caches and cursor.
#[derive(Clone)]
pub struct Reader {
    channel_root: Vec<Trit>,
    root_trytes: String,
    channel_password: Option<String>,
    ledger: Arc<dyn LedgerClient>,
    state: Arc<RwLock<ReaderState>>,
}

enum IndexFetch {
    /// Nothing attached at the index's address.
    Empty,
    Verified {
        message: String,
        next_root: Option<String>,
        skipped: Vec<SkippedBundle>,
    },
    Rejected {
        error: ChannelError,
        skipped: Vec<SkippedBundle>,
    },
}

impl Reader {
    /// Create a reader for a channel root. Height and security may be
    /// supplied up front or learned from the first verified message.
    pub fn new(
        channel_root: &str,
        ledger: Arc<dyn LedgerClient>,
        config: ReaderConfig,
    ) -> ChannelResult<Self> {
        let root = trytes_to_trits(channel_root)?;
        if let Some(password) = &config.channel_password {
            validate_trytes(password)?;
        }
        if let Some(height) = config.height {
            if !(1..=26).contains(&height) {
                return Err(CodecError::InvalidHeight(height).into());
            }
        }
        if let Some(security) = config.security {
            ots::validate_security(security)?;
        }

        Ok(Self {
            channel_root: root,
            root_trytes: channel_root.to_string(),
            channel_password: config.channel_password,
            ledger,
            state: Arc::new(RwLock::new(ReaderState {
                height: config.height,
                security: config.security,
                ..Default::default()
            })),
        })
    }

    /// The channel root as trytes.
    pub fn channel_root(&self) -> &str {
        &self.root_trytes
    }

    /// Cached message at an index, if verified before.
    pub fn message(&self, index: u64) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.messages.get(&index).cloned())
    }

    /// Cached branch pointer at an index, if any.
    pub fn branch(&self, index: u64) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.branches.get(&index).cloned())
    }

    /// First index with no cached message.
    pub fn cursor(&self) -> u64 {
        self.state.read().map(|state| state.cursor).unwrap_or(0)
    }

    /// Channel capacity, once the height is known.
    pub fn capacity(&self) -> Option<u64> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.height)
            .map(|height| 1u64 << height)
    }

    /// Fetch a range of indexes, returning one event per index touched.
    /// Cached entries are replayed from the cache; holes are fetched from
    /// the ledger and verified. With no `end`, the walk stops at the first
    /// index whose address holds nothing.
    pub async fn fetch(&self, config: &FetchConfig) -> ChannelResult<Vec<ReadEvent>> {
        let (start, end) = match config.index {
            Some(index) => (index, Some(index)),
            None => (config.start.unwrap_or(0), config.end),
        };

        let mut events = Vec::new();
        let mut index = start;
        loop {
            if let Some(end) = end {
                if index > end {
                    break;
                }
            }
            if let Some(capacity) = self.capacity() {
                if index >= capacity {
                    break;
                }
            }

            if let Some(message) = self.message(index) {
                events.push(ReadEvent {
                    index: Some(index),
                    message: Some(message),
                    next_root: self.branch(index),
                    ..Default::default()
                });
                index += 1;
                continue;
            }

            match self
                .fetch_index(index, config.message_password.as_deref(), false)
                .await?
            {
                IndexFetch::Empty => {
                    if end.is_none() {
                        break;
                    }
                }
                IndexFetch::Verified {
                    message,
                    next_root,
                    skipped,
                } => {
                    events.push(ReadEvent {
                        index: Some(index),
                        message: Some(message),
                        next_root,
                        skipped,
                        ..Default::default()
                    });
                }
                IndexFetch::Rejected { error, skipped } => {
                    events.push(ReadEvent {
                        index: Some(index),
                        skipped,
                        error: Some(Arc::new(error)),
                        ..Default::default()
                    });
                }
            }
            index += 1;
        }
        Ok(events)
    }

    /// Fetch one index; per-index verification failures are raised.
    pub async fn fetch_message(&self, index: u64) -> ChannelResult<Option<String>> {
        if let Some(message) = self.message(index) {
            return Ok(Some(message));
        }
        match self.fetch_index(index, None, false).await? {
            IndexFetch::Empty => Ok(None),
            IndexFetch::Verified { message, .. } => Ok(Some(message)),
            IndexFetch::Rejected { error, .. } => Err(error),
        }
    }

    /// Walk forward from the beginning until the first empty index,
    /// filling every cache hole on the way.
    pub async fn sync(&self) -> ChannelResult<Vec<ReadEvent>> {
        let events = self.fetch(&FetchConfig::default()).await?;
        info!(cursor = self.cursor(), "channel synchronized");
        Ok(events)
    }

    /// Subscribe to live bundles for every cache hole in the configured
    /// range. Verified arrivals populate the caches and reach the
    /// observer; with `follow`, each verified index transparently watches
    /// its successor.
    pub async fn subscribe(
        &self,
        hub: &SubscriptionHub,
        observer: Arc<dyn ReadObserver>,
        config: &SubscribeConfig,
    ) -> ChannelResult<ReaderSubscription> {
        let ctx = Arc::new(SubCtx {
            reader: self.clone(),
            hub: hub.clone(),
            observer,
            message_password: config.message_password.clone(),
            public: config.public,
            follow: config.follow,
            subs: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let end = config.end.unwrap_or(config.start);
        for index in config.start..=end {
            subscribe_index(Arc::clone(&ctx), index).await?;
        }
        Ok(ReaderSubscription { ctx })
    }

    /// Stateless single-index fetch against a root.
    pub async fn fetch_single(
        ledger: Arc<dyn LedgerClient>,
        channel_root: &str,
        index: u64,
        config: ReaderConfig,
    ) -> ChannelResult<Option<String>> {
        Reader::new(channel_root, ledger, config)?
            .fetch_message(index)
            .await
    }

    /// Stateless range fetch against a root.
    pub async fn fetch_messages(
        ledger: Arc<dyn LedgerClient>,
        channel_root: &str,
        reader_config: ReaderConfig,
        fetch_config: &FetchConfig,
    ) -> ChannelResult<Vec<ReadEvent>> {
        Reader::new(channel_root, ledger, reader_config)?
            .fetch(fetch_config)
            .await
    }

    /// Recover a public-mode message knowing only its address. The channel
    /// root is recomputed from the verifying key and auth path, then the
    /// address itself is re-derived to authenticate the recovery.
    pub async fn fetch_public(
        ledger: &Arc<dyn LedgerClient>,
        address: &str,
    ) -> ChannelResult<Option<PublicMessage>> {
        validate_trytes(address)?;
        let bundle_ids = ledger.find_by_address(address).await?;
        if bundle_ids.is_empty() {
            return Ok(None);
        }
        let records = ledger.get_records(&bundle_ids).await?;

        for bundle in bundles_from_records(records) {
            let parsed = match parse_bundle(
                &bundle,
                &ParseOptions {
                    public_mode: true,
                    ..Default::default()
                },
            ) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(bundle = %bundle[0].bundle, reason = %e, "skipping bundle");
                    continue;
                }
            };

            let input = signing_input(
                &parsed.message,
                parsed.index,
                &parsed.verifying_key,
                parsed.next_root.as_deref(),
                &parsed.auth_path,
            )?;
            let digest = ots::message_digest(&input, parsed.security)?;
            ots::verify(&parsed.signature, &digest, &parsed.verifying_key)
                .map_err(|_| ChannelError::VerificationFailed(parsed.index))?;

            let root = recover_root(&parsed.verifying_key, parsed.index, &parsed.auth_path);
            if derive_address(&root, parsed.index, None)? != address {
                return Err(ChannelError::AuthenticationFailed(parsed.index));
            }

            return Ok(Some(PublicMessage {
                index: parsed.index,
                message: parsed.message,
                channel_root: trits_to_trytes(&root)?,
                next_root: parsed.next_root.as_deref().map(trits_to_trytes).transpose()?,
            }));
        }
        Ok(None)
    }

    /// [`Reader::fetch_public`] over many addresses, keyed by address.
    pub async fn fetch_public_messages(
        ledger: &Arc<dyn LedgerClient>,
        addresses: &[String],
    ) -> HashMap<String, ChannelResult<Option<PublicMessage>>> {
        let mut results = HashMap::with_capacity(addresses.len());
        for address in addresses {
            let result = Self::fetch_public(ledger, address).await;
            results.insert(address.clone(), result);
        }
        results
    }

    fn expectations(&self) -> ChannelResult<(Option<usize>, Option<usize>)> {
        let state = self.state.read().map_err(|_| ChannelError::LockPoisoned)?;
        Ok((state.height, state.security))
    }

    /// Parse, verify, and cache one bundle for one index. Shared by the
    /// fetch and subscription paths.
    fn process_bundle(
        &self,
        index: u64,
        records: &[Record],
        message_password: Option<&str>,
        public: bool,
    ) -> ChannelResult<(String, Option<String>)> {
        let (expected_height, expected_security) = self.expectations()?;
        let parsed = parse_bundle(
            records,
            &ParseOptions {
                index: Some(index),
                channel_root: Some(&self.channel_root),
                channel_password: self.channel_password.as_deref(),
                message_password,
                public_mode: public,
                expected_height,
                expected_security,
            },
        )?;

        let input = signing_input(
            &parsed.message,
            parsed.index,
            &parsed.verifying_key,
            parsed.next_root.as_deref(),
            &parsed.auth_path,
        )?;
        let digest = ots::message_digest(&input, parsed.security)?;
        ots::verify(&parsed.signature, &digest, &parsed.verifying_key)
            .map_err(|_| ChannelError::VerificationFailed(index))?;
        verify_path(&self.channel_root, &parsed.verifying_key, index, &parsed.auth_path)
            .map_err(|_| ChannelError::AuthenticationFailed(index))?;

        let next_root = parsed.next_root.as_deref().map(trits_to_trytes).transpose()?;

        let mut state = self.state.write().map_err(|_| ChannelError::LockPoisoned)?;
        state.height.get_or_insert(parsed.height);
        state.security.get_or_insert(parsed.security);
        let message = state
            .messages
            .entry(index)
            .or_insert_with(|| parsed.message.clone())
            .clone();
        if let Some(next_root) = &next_root {
            state.branches.entry(index).or_insert_with(|| next_root.clone());
        }
        while state.messages.contains_key(&state.cursor) {
            state.cursor += 1;
        }
        debug!(index, "message verified");
        Ok((message, next_root))
    }

    /// Resolve one index against the ledger: try each bundle at its
    /// address oldest-first; the first that parses wins.
    async fn fetch_index(
        &self,
        index: u64,
        message_password: Option<&str>,
        public: bool,
    ) -> ChannelResult<IndexFetch> {
        let address = derive_address(&self.channel_root, index, self.channel_password.as_deref())?;
        let bundle_ids = self.ledger.find_by_address(&address).await?;
        if bundle_ids.is_empty() {
            return Ok(IndexFetch::Empty);
        }
        let records = self.ledger.get_records(&bundle_ids).await?;
        let bundles = bundles_from_records(records);
        if bundles.is_empty() {
            return Ok(IndexFetch::Empty);
        }

        let mut skipped = Vec::new();
        let mut winner: Option<(String, Option<String>)> = None;
        let mut rejection: Option<ChannelError> = None;

        for bundle in &bundles {
            let id = bundle[0].bundle.clone();
            if winner.is_some() {
                skipped.push(SkippedBundle {
                    bundle: id,
                    reason: "superseded by an earlier bundle".into(),
                });
                continue;
            }
            match self.process_bundle(index, bundle, message_password, public) {
                Ok(result) => winner = Some(result),
                Err(
                    error @ (ChannelError::VerificationFailed(_)
                    | ChannelError::AuthenticationFailed(_)),
                ) => {
                    // This bundle parsed, so it owns the index; its
                    // verification failure is the index's outcome.
                    rejection = Some(error);
                    break;
                }
                Err(error) => {
                    skipped.push(SkippedBundle {
                        bundle: id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        match (winner, rejection) {
            (Some((message, next_root)), _) => Ok(IndexFetch::Verified {
                message,
                next_root,
                skipped,
            }),
            (None, Some(error)) => Ok(IndexFetch::Rejected { error, skipped }),
            (None, None) => Ok(IndexFetch::Rejected {
                error: ChannelError::VerificationFailed(index),
                skipped,
            }),
        }
    }
}

struct SubCtx {
    reader: Reader,
    hub: SubscriptionHub,
    observer: Arc<dyn ReadObserver>,
    message_password: Option<String>,
    public: bool,
    follow: bool,
    subs: Mutex<Vec<(u64, Subscription)>>,
    closed: AtomicBool,
}

/// Handle over every per-index subscription a [`Reader::subscribe`] call
/// opened (plus any follow-ons). `unsubscribe` is idempotent and cancels
/// pending callbacks cleanly.
pub struct ReaderSubscription {
    ctx: Arc<SubCtx>,
}

impl ReaderSubscription {
    /// Number of indexes currently watched.
    pub fn watched_count(&self) -> usize {
        self.ctx
            .subs
            .lock()
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    pub fn unsubscribe(&self) {
        if self.ctx.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let drained: Vec<(u64, Subscription)> = {
            let mut subs = self.ctx.subs.lock().expect("subscription lock poisoned");
            subs.drain(..).collect()
        };
        if let Ok(mut state) = self.ctx.reader.state.write() {
            for (index, _) in &drained {
                state.subscribed.remove(index);
            }
        }
        for (_, sub) in drained {
            sub.unsubscribe();
        }
        info!("reader subscription closed");
    }
}

async fn subscribe_index(ctx: Arc<SubCtx>, index: u64) -> ChannelResult<()> {
    if ctx.closed.load(Ordering::SeqCst) {
        return Ok(());
    }
    if let Some(capacity) = ctx.reader.capacity() {
        if index >= capacity {
            return Ok(());
        }
    }
    {
        let mut state = ctx
            .reader
            .state
            .write()
            .map_err(|_| ChannelError::LockPoisoned)?;
        if state.messages.contains_key(&index) || !state.subscribed.insert(index) {
            return Ok(());
        }
    }

    let address = derive_address(
        &ctx.reader.channel_root,
        index,
        ctx.reader.channel_password.as_deref(),
    )?;
    let cb_ctx = Arc::clone(&ctx);
    let callback: BundleCallback = Arc::new(move |bundle: Vec<Record>| {
        handle_bundle(&cb_ctx, index, bundle);
    });

    match ctx.hub.subscribe(&address, callback).await {
        Ok(sub) => {
            if ctx.closed.load(Ordering::SeqCst) {
                sub.unsubscribe();
                return Ok(());
            }
            ctx.subs
                .lock()
                .map_err(|_| ChannelError::LockPoisoned)?
                .push((index, sub));
            debug!(index, "watching index");
            Ok(())
        }
        Err(e) => {
            if let Ok(mut state) = ctx.reader.state.write() {
                state.subscribed.remove(&index);
            }
            Err(e.into())
        }
    }
}

fn handle_bundle(ctx: &Arc<SubCtx>, index: u64, bundle: Vec<Record>) {
    if ctx.closed.load(Ordering::SeqCst) {
        return;
    }
    if ctx.reader.message(index).is_some() {
        return;
    }

    let mut event = ReadEvent {
        index: Some(index),
        ..Default::default()
    };
    match ctx
        .reader
        .process_bundle(index, &bundle, ctx.message_password.as_deref(), ctx.public)
    {
        Ok((message, next_root)) => {
            event.message = Some(message);
            event.next_root = next_root;
            if ctx.follow {
                let next = index + 1;
                let within = ctx.reader.capacity().map(|c| next < c).unwrap_or(true);
                if within {
                    let follow_ctx = Arc::clone(ctx);
                    tokio::spawn(async move {
                        if let Err(e) = subscribe_index(Arc::clone(&follow_ctx), next).await {
                            warn!(index = next, error = %e, "follow-on subscription failed");
                        }
                    });
                }
            }
        }
        Err(error) => {
            event.skipped.push(SkippedBundle {
                bundle: bundle[0].bundle.clone(),
                reason: error.to_string(),
            });
            event.error = Some(Arc::new(error));
        }
    }
    ctx.observer.on_record(event);
}
