//! Anchor lifecycle coordinator.
//!
//! Drives each anchor through `Pending -> Localized -> Persisted` against an
//! [`AnchorHost`], and owns the two collections the rest of an application
//! reads:
//!
//! - the **active set**: anchors instantiated in the running session,
//!   whether or not they are persisted;
//! - the **persisted identifier set**: ids of anchors saved for future
//!   sessions, written through an [`IdentifierStore`].
//!
//! Alongside those it tracks the handles of anchors saved or reloaded in
//! this session; that tracking set is what [`AnchorCoordinator::erase_all_persisted`]
//! asks the host to erase.
//!
//! All mutation of these collections happens inside the coordinator under a
//! single lock, and no lock is held across a host call. Operations take
//! `&self`, so callers may run several at once (for example two creations
//! joined together) without losing updates.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cancel::OrCancelExt;
use crate::host::{AnchorHost, LiveAnchor, UnboundAnchor};
use crate::spatial::Pose;
use crate::store::IdentifierStore;
use crate::types::{AnchorError, AnchorId, AnchorRecord, AnchorState, Result};

/// Tuning for the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Delay between checks of a pending anchor's tracking state
    pub poll_interval: Duration,
    /// Upper bound on the wait for localization (None = wait indefinitely)
    pub localize_timeout: Option<Duration>,
    /// Also ask the host to erase persisted ids that have no handle in this
    /// session (anchors saved by an earlier session and never reloaded)
    pub erase_unbound_identifiers: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(11), // roughly one frame at 90 Hz
            localize_timeout: Some(Duration::from_secs(30)),
            erase_unbound_identifiers: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_localize_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.localize_timeout = timeout;
        self
    }

    pub fn with_erase_unbound_identifiers(mut self, enabled: bool) -> Self {
        self.erase_unbound_identifiers = enabled;
        self
    }
}

impl From<&xr_anchors_config::CoordinatorSettings> for CoordinatorConfig {
    fn from(settings: &xr_anchors_config::CoordinatorSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            localize_timeout: match settings.localize_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            erase_unbound_identifiers: settings.erase_unbound_identifiers,
        }
    }
}

/// What happened to the save requested alongside a creation.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// The caller did not ask for persistence
    NotRequested,
    /// Saved by the host and recorded in the persisted identifier set
    Persisted,
    /// The anchor is active but not durable
    Failed(AnchorError),
}

/// Result of [`AnchorCoordinator::create_anchor`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedAnchor {
    pub record: AnchorRecord,
    pub persistence: PersistOutcome,
}

impl CreatedAnchor {
    pub fn id(&self) -> AnchorId {
        self.record.id
    }

    /// True when the anchor will be reloadable in a later session
    pub fn is_durable(&self) -> bool {
        matches!(self.persistence, PersistOutcome::Persisted)
    }
}

/// A per-anchor failure inside a reload batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizeFailure {
    pub id: AnchorId,
    pub error: AnchorError,
}

/// Outcome of [`AnchorCoordinator::reload_persisted_anchors`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReloadReport {
    /// Number of ids sent to the host in the load batch
    pub requested: usize,
    /// Anchors bound and added to the active set, in completion order
    pub loaded: Vec<AnchorRecord>,
    /// Anchors the host loaded but could not localize
    pub failures: Vec<LocalizeFailure>,
    /// Requested ids the host did not return
    pub missing: Vec<AnchorId>,
    /// Persisted ids skipped because they are already bound in this session
    pub already_active: Vec<AnchorId>,
}

impl ReloadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.missing.is_empty()
    }
}

/// Outcome of [`AnchorCoordinator::erase_all_persisted`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EraseReport {
    /// Session handles handed to the host
    pub erased_handles: usize,
    /// Bare identifiers handed to the host (see `erase_unbound_identifiers`)
    pub erased_ids: usize,
    /// Identifiers removed from the persisted identifier set
    pub cleared_ids: usize,
}

struct ActiveAnchor<T> {
    record: AnchorRecord,
    handle: T,
}

struct Collections<T> {
    active: BTreeMap<AnchorId, ActiveAnchor<T>>,
    persisted: BTreeSet<AnchorId>,
    saved: HashMap<AnchorId, T>,
}

/// Coordinates anchor creation, persistence, reload and erasure for one session.
pub struct AnchorCoordinator<H: AnchorHost, S: IdentifierStore> {
    host: Arc<H>,
    store: Arc<S>,
    config: CoordinatorConfig,
    state: RwLock<Collections<H::Handle>>,
    cancel: Mutex<CancellationToken>,
}

impl<H: AnchorHost, S: IdentifierStore> AnchorCoordinator<H, S> {
    /// Create a coordinator, seeding the persisted identifier set from `store`.
    pub fn new(host: Arc<H>, store: Arc<S>, config: CoordinatorConfig) -> Result<Self> {
        let persisted = store.load().map_err(AnchorError::store)?;
        info!(
            "Anchor coordinator ready with {} persisted identifier(s)",
            persisted.len()
        );

        Ok(Self {
            host,
            store,
            config,
            state: RwLock::new(Collections {
                active: BTreeMap::new(),
                persisted,
                saved: HashMap::new(),
            }),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Create an anchor at `pose`, wait for it to localize, and optionally persist it.
    ///
    /// The anchor joins the active set once the host reports it created and
    /// localized. A failed save does not fail the call: the anchor stays
    /// active and `persistence` carries the error.
    pub async fn create_anchor(&self, pose: Pose, persist: bool) -> Result<CreatedAnchor> {
        self.ensure_ready()?;
        let token = self.current_token();

        let handle = self.host.create_anchor_at(pose);
        let id = handle.id();
        let mut record = AnchorRecord::pending(id, pose);
        debug!("Anchor {} pending at {}", id, pose.position);

        if let Err(e) = self.wait_until_localized(&handle, &token).await {
            warn!("Anchor {} never localized: {}", id, e);
            self.host.release(&handle);
            return Err(e);
        }

        record.pose = handle.pose();
        record.advance(AnchorState::Localized);
        {
            let mut state = self.state.write().await;
            state.active.insert(
                id,
                ActiveAnchor {
                    record: record.clone(),
                    handle: handle.clone(),
                },
            );
        }
        debug!("Anchor {} localized and active", id);

        let persistence = if persist {
            self.persist_created(&handle, &token).await
        } else {
            PersistOutcome::NotRequested
        };

        match &persistence {
            PersistOutcome::Persisted => {
                record.advance(AnchorState::Persisted);
                info!("Anchor {} created and persisted", id);
            }
            PersistOutcome::Failed(e) => {
                warn!("Anchor {} is active but not persisted: {}", id, e);
            }
            PersistOutcome::NotRequested => {
                info!("Anchor {} created", id);
            }
        }

        Ok(CreatedAnchor {
            record,
            persistence,
        })
    }

    /// Load every persisted anchor not already bound in this session and
    /// bind each one that localizes.
    ///
    /// A batch-level load failure aborts with no change to the active set.
    /// Per-anchor localization failures are collected in the report and do
    /// not affect their siblings; completions are handled in arrival order.
    pub async fn reload_persisted_anchors(&self) -> Result<ReloadReport> {
        self.ensure_ready()?;
        let token = self.current_token();

        let (requested, already_active): (Vec<AnchorId>, Vec<AnchorId>) = {
            let state = self.state.read().await;
            state
                .persisted
                .iter()
                .copied()
                .partition(|id| !state.active.contains_key(id))
        };

        let mut report = ReloadReport {
            requested: requested.len(),
            already_active,
            ..ReloadReport::default()
        };

        if requested.is_empty() {
            debug!("No persisted anchors to reload");
            return Ok(report);
        }

        let unbound = match self.host.load_unbound(&requested).or_cancel(&token).await? {
            Ok(unbound) => unbound,
            Err(status) => {
                error!("Load anchors failed with {}", status);
                return Err(AnchorError::LoadFailed(status));
            }
        };
        debug!(
            "Host returned {} of {} requested anchor(s)",
            unbound.len(),
            requested.len()
        );

        let returned: HashSet<AnchorId> = unbound.iter().map(|anchor| anchor.id()).collect();
        report.missing = requested
            .iter()
            .copied()
            .filter(|id| !returned.contains(id))
            .collect();

        let mut outstanding = returned;
        let host = &self.host;
        let mut localizing: FuturesUnordered<_> = unbound
            .into_iter()
            .map(|anchor| async move {
                let result = host.localize(&anchor).await;
                (anchor, result)
            })
            .collect();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    warn!(
                        "Reload cancelled with {} anchor(s) still localizing",
                        outstanding.len()
                    );
                    report.failures.extend(outstanding.drain().map(|id| LocalizeFailure {
                        id,
                        error: AnchorError::Cancelled,
                    }));
                    break;
                }
                next = localizing.next() => {
                    let Some((anchor, result)) = next else {
                        break;
                    };
                    let id = anchor.id();
                    outstanding.remove(&id);
                    match result {
                        Ok(pose) => {
                            if let Some(record) = self.bind_reloaded(anchor, pose).await {
                                report.loaded.push(record);
                            } else {
                                report.already_active.push(id);
                            }
                        }
                        Err(status) => {
                            warn!("Anchor {} failed to localize: {}", id, status);
                            report.failures.push(LocalizeFailure {
                                id,
                                error: AnchorError::LocalizeFailed { id, status },
                            });
                        }
                    }
                }
            }
        }

        info!(
            "Reloaded {} anchor(s), {} failed, {} missing",
            report.loaded.len(),
            report.failures.len(),
            report.missing.len()
        );
        Ok(report)
    }

    /// Erase the anchors saved in this session from host storage and forget
    /// every persisted identifier.
    ///
    /// Both the persisted identifier set and the saved tracking set change
    /// together, or not at all when the host or the store fails.
    pub async fn erase_all_persisted(&self) -> Result<EraseReport> {
        self.ensure_ready()?;
        let token = self.current_token();

        let (snapshot, saved_ids, handles, extra_ids) = {
            let state = self.state.read().await;
            let snapshot = state.persisted.clone();
            let saved_ids: Vec<AnchorId> = state.saved.keys().copied().collect();
            let handles: Vec<H::Handle> = state.saved.values().cloned().collect();
            let extra_ids: Vec<AnchorId> = if self.config.erase_unbound_identifiers {
                snapshot
                    .iter()
                    .copied()
                    .filter(|id| !state.saved.contains_key(id))
                    .collect()
            } else {
                Vec::new()
            };
            (snapshot, saved_ids, handles, extra_ids)
        };

        if let Err(status) = self.host.erase(&handles, &extra_ids).or_cancel(&token).await? {
            error!("Anchors NOT erased: {}", status);
            return Err(AnchorError::EraseFailed(status));
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        // Ids saved while the erase was in flight were never sent to the host; keep them.
        let remaining: BTreeSet<AnchorId> = state.persisted.difference(&snapshot).copied().collect();
        self.write_store(remaining.clone()).await?;

        let cleared_ids = state.persisted.len() - remaining.len();
        state.persisted = remaining;
        for id in &saved_ids {
            state.saved.remove(id);
        }
        for active in state.active.values_mut() {
            if !state.persisted.contains(&active.record.id) {
                active.record.persisted = false;
            }
        }

        info!("Anchors erased ({} identifier(s) cleared)", cleared_ids);
        Ok(EraseReport {
            erased_handles: handles.len(),
            erased_ids: extra_ids.len(),
            cleared_ids,
        })
    }

    /// Remove every anchor from the scene.
    ///
    /// This only releases in-scene representations. Persisted identifiers
    /// and host storage are untouched, so the anchors can be reloaded.
    pub async fn teardown_active_anchors(&self) -> usize {
        let drained = {
            let mut state = self.state.write().await;
            std::mem::take(&mut state.active)
        };

        for active in drained.values() {
            self.host.release(&active.handle);
        }

        info!("Tore down {} active anchor(s)", drained.len());
        drained.len()
    }

    /// Cancel every in-flight wait, save, load and erase.
    ///
    /// Operations started afterwards use a fresh token and are unaffected.
    ///
    /// A save cancelled after the host committed it leaves the anchor in host
    /// storage with its id in neither the persisted set nor the saved set, so
    /// [`erase_all_persisted`](Self::erase_all_persisted) cannot reach it. The
    /// id is logged at `warn` level.
    pub fn cancel_in_flight(&self) {
        let mut token = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        token.cancel();
        *token = CancellationToken::new();
        debug!("Cancelled in-flight anchor operations");
    }

    /// Active anchors, oldest first
    pub async fn active_anchors(&self) -> Vec<AnchorRecord> {
        let state = self.state.read().await;
        let mut records: Vec<AnchorRecord> =
            state.active.values().map(|a| a.record.clone()).collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub async fn anchor(&self, id: AnchorId) -> Option<AnchorRecord> {
        let state = self.state.read().await;
        state.active.get(&id).map(|a| a.record.clone())
    }

    pub async fn persisted_ids(&self) -> BTreeSet<AnchorId> {
        self.state.read().await.persisted.clone()
    }

    /// Number of anchors saved or reloaded in this session (the erase target)
    pub async fn saved_in_session(&self) -> usize {
        self.state.read().await.saved.len()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.host.is_ready() {
            Ok(())
        } else {
            warn!("Host platform is not ready");
            Err(AnchorError::HostUnavailable)
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn wait_until_localized(
        &self,
        handle: &H::Handle,
        token: &CancellationToken,
    ) -> Result<()> {
        let interval = self.config.poll_interval;
        let poll = async move {
            while !(handle.is_created() && handle.is_localized()) {
                if interval.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(interval).await;
                }
            }
        };

        match self.config.localize_timeout {
            Some(limit) => tokio::time::timeout(limit, poll)
                .or_cancel(token)
                .await?
                .map_err(|_| AnchorError::Timeout(limit)),
            None => poll.or_cancel(token).await,
        }
    }

    async fn persist_created(&self, handle: &H::Handle, token: &CancellationToken) -> PersistOutcome {
        match self.host.save(handle).or_cancel(token).await {
            Err(e) => {
                warn!(
                    "Save of anchor {} cancelled; the host may still hold it in storage",
                    handle.id()
                );
                PersistOutcome::Failed(e)
            }
            Ok(Err(status)) => PersistOutcome::Failed(AnchorError::SaveFailed(status)),
            Ok(Ok(())) => match self.record_saved(handle).await {
                Ok(()) => PersistOutcome::Persisted,
                Err(e) => PersistOutcome::Failed(e),
            },
        }
    }

    /// Write a freshly saved id through the store, then commit it in memory.
    async fn record_saved(&self, handle: &H::Handle) -> Result<()> {
        let id = handle.id();
        let mut state = self.state.write().await;

        let mut next = state.persisted.clone();
        next.insert(id);
        self.write_store(next.clone()).await?;

        state.persisted = next;
        state.saved.insert(id, handle.clone());
        // A teardown may have removed the anchor while the save was in flight.
        if let Some(active) = state.active.get_mut(&id) {
            active.record.advance(AnchorState::Persisted);
        }
        Ok(())
    }

    /// Write `ids` through the store on the blocking pool.
    ///
    /// Callers hold the state write lock, which keeps store writes in commit order.
    async fn write_store(&self, ids: BTreeSet<AnchorId>) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&ids))
            .await
            .map_err(|e| AnchorError::Store(format!("store writer task failed: {}", e)))?
            .map_err(AnchorError::store)
    }

    /// Bind a localized unbound anchor and add it to the active set.
    ///
    /// Returns None when the id got bound by a concurrent reload first.
    async fn bind_reloaded(&self, anchor: H::Unbound, pose: Pose) -> Option<AnchorRecord> {
        let id = anchor.id();
        let handle = self.host.bind_to(anchor, pose);
        let mut state = self.state.write().await;

        if state.active.contains_key(&id) {
            drop(state);
            self.host.release(&handle);
            return None;
        }

        let mut record = AnchorRecord::pending(id, pose);
        if state.persisted.contains(&id) {
            record.advance(AnchorState::Persisted);
            state.saved.insert(id, handle.clone());
        } else {
            // Erased while localizing: active, but no longer durable.
            record.advance(AnchorState::Localized);
        }
        state.active.insert(
            id,
            ActiveAnchor {
                record: record.clone(),
                handle,
            },
        );
        debug!("Anchor {} reloaded at {}", id, pose.position);
        Some(record)
    }
}
