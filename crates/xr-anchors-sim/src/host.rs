//! Simulated implementation of [`AnchorHost`]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};
use xr_anchors_core::{AnchorHost, AnchorId, HostStatus, LiveAnchor, Pose, UnboundAnchor};

use crate::vault::HostVault;

/// Status codes reported by the simulator
pub mod status {
    use xr_anchors_core::HostStatus;

    pub const FAILURE: HostStatus = HostStatus(-1000);
    pub const STORAGE_IO: HostStatus = HostStatus(-1001);
    pub const NOT_FOUND: HostStatus = HostStatus(-1002);
    pub const LOCALIZATION_FAILED: HostStatus = HostStatus(-1003);
}

/// Behavior of a [`SimulatedHost`]
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Polls of `is_localized` before a new anchor reports localized.
    /// `None` keeps new anchors pending forever.
    pub polls_to_localize: Option<u32>,
    /// Delay applied to every save, load, localize and erase
    pub latency: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            polls_to_localize: Some(3),
            latency: Duration::from_millis(2),
        }
    }
}

#[derive(Debug)]
struct TrackingState {
    polls: AtomicU32,
    localize_after: Option<u32>,
    released: AtomicBool,
}

/// Live anchor handed out by the simulator
#[derive(Debug, Clone)]
pub struct SimHandle {
    id: AnchorId,
    pose: Pose,
    tracking: Arc<TrackingState>,
}

impl SimHandle {
    fn new(id: AnchorId, pose: Pose, localize_after: Option<u32>) -> Self {
        Self {
            id,
            pose,
            tracking: Arc::new(TrackingState {
                polls: AtomicU32::new(0),
                localize_after,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_released(&self) -> bool {
        self.tracking.released.load(Ordering::SeqCst)
    }
}

impl LiveAnchor for SimHandle {
    fn id(&self) -> AnchorId {
        self.id
    }

    fn is_created(&self) -> bool {
        !self.is_released()
    }

    fn is_localized(&self) -> bool {
        let Some(after) = self.tracking.localize_after else {
            return false;
        };
        let seen = self.tracking.polls.fetch_add(1, Ordering::SeqCst) + 1;
        seen >= after
    }

    fn pose(&self) -> Pose {
        self.pose
    }
}

/// Anchor loaded from the vault, not yet bound
#[derive(Debug)]
pub struct SimUnbound {
    id: AnchorId,
}

impl UnboundAnchor for SimUnbound {
    fn id(&self) -> AnchorId {
        self.id
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_saves: u32,
    save_delays: VecDeque<Duration>,
    load_failure: Option<HostStatus>,
    load_delay: Option<Duration>,
    unlocalizable: HashSet<AnchorId>,
    localize_delays: HashMap<AnchorId, Duration>,
    erase_failure: Option<HostStatus>,
    erase_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Journal {
    live: HashSet<AnchorId>,
    released: Vec<AnchorId>,
    load_requests: Vec<Vec<AnchorId>>,
    erase_requests: Vec<(Vec<AnchorId>, Vec<AnchorId>)>,
}

/// An [`AnchorHost`] that runs entirely in process.
pub struct SimulatedHost {
    config: SimConfig,
    vault: Arc<HostVault>,
    ready: AtomicBool,
    faults: Mutex<Faults>,
    journal: Mutex<Journal>,
}

impl SimulatedHost {
    pub fn new(config: SimConfig) -> Self {
        Self::with_vault(config, Arc::new(HostVault::in_memory()))
    }

    /// Host sharing an existing vault, as after an application restart
    pub fn with_vault(config: SimConfig, vault: Arc<HostVault>) -> Self {
        Self {
            config,
            vault,
            ready: AtomicBool::new(true),
            faults: Mutex::new(Faults::default()),
            journal: Mutex::new(Journal::default()),
        }
    }

    pub fn vault(&self) -> &Arc<HostVault> {
        &self.vault
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Fail the next `count` saves with [`status::FAILURE`].
    pub fn fail_next_saves(&self, count: u32) {
        self.faults().failing_saves = count;
    }

    /// Delays for upcoming saves, consumed in call order
    pub fn queue_save_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.faults().save_delays.extend(delays);
    }

    pub fn fail_loads(&self, status: Option<HostStatus>) {
        self.faults().load_failure = status;
    }

    /// Make every load take `delay` instead of the configured latency.
    pub fn delay_loads(&self, delay: Duration) {
        self.faults().load_delay = Some(delay);
    }

    pub fn fail_localization_of(&self, id: AnchorId) {
        self.faults().unlocalizable.insert(id);
    }

    pub fn delay_localization_of(&self, id: AnchorId, delay: Duration) {
        self.faults().localize_delays.insert(id, delay);
    }

    pub fn fail_erases(&self, status: Option<HostStatus>) {
        self.faults().erase_failure = status;
    }

    pub fn delay_erases(&self, delay: Duration) {
        self.faults().erase_delay = Some(delay);
    }

    /// Anchors currently instantiated and not released
    pub fn live_count(&self) -> usize {
        self.journal().live.len()
    }

    pub fn released_ids(&self) -> Vec<AnchorId> {
        self.journal().released.clone()
    }

    /// Id batches passed to `load_unbound`, oldest first
    pub fn load_requests(&self) -> Vec<Vec<AnchorId>> {
        self.journal().load_requests.clone()
    }

    /// `(handle ids, bare ids)` passed to each `erase`, oldest first
    pub fn erase_requests(&self) -> Vec<(Vec<AnchorId>, Vec<AnchorId>)> {
        self.journal().erase_requests.clone()
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn pause(&self, extra: Option<Duration>) {
        let delay = extra.unwrap_or(self.config.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

#[async_trait]
impl AnchorHost for SimulatedHost {
    type Handle = SimHandle;
    type Unbound = SimUnbound;

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn create_anchor_at(&self, pose: Pose) -> SimHandle {
        let handle = SimHandle::new(AnchorId::new_v4(), pose, self.config.polls_to_localize);
        self.journal().live.insert(handle.id);
        debug!("sim: instantiated anchor {}", handle.id);
        handle
    }

    async fn save(&self, handle: &SimHandle) -> Result<(), HostStatus> {
        let (delay, fail) = {
            let mut faults = self.faults();
            let delay = faults.save_delays.pop_front();
            let fail = faults.failing_saves > 0;
            if fail {
                faults.failing_saves -= 1;
            }
            (delay, fail)
        };
        self.pause(delay).await;

        if fail {
            return Err(status::FAILURE);
        }
        self.vault.insert(handle.id, handle.pose).map_err(|e| {
            warn!("sim: vault write failed: {:#}", e);
            status::STORAGE_IO
        })
    }

    async fn load_unbound(&self, ids: &[AnchorId]) -> Result<Vec<SimUnbound>, HostStatus> {
        self.journal().load_requests.push(ids.to_vec());
        let delay = self.faults().load_delay;
        self.pause(delay).await;

        if let Some(status) = self.faults().load_failure {
            return Err(status);
        }
        Ok(ids
            .iter()
            .filter(|id| self.vault.contains(id))
            .map(|id| SimUnbound { id: *id })
            .collect())
    }

    async fn localize(&self, anchor: &SimUnbound) -> Result<Pose, HostStatus> {
        let (delay, fail) = {
            let faults = self.faults();
            (
                faults.localize_delays.get(&anchor.id).copied(),
                faults.unlocalizable.contains(&anchor.id),
            )
        };
        self.pause(delay).await;

        if fail {
            return Err(status::LOCALIZATION_FAILED);
        }
        self.vault.get(&anchor.id).ok_or(status::NOT_FOUND)
    }

    fn bind_to(&self, anchor: SimUnbound, pose: Pose) -> SimHandle {
        let handle = SimHandle::new(anchor.id, pose, Some(0));
        self.journal().live.insert(handle.id);
        handle
    }

    async fn erase(&self, handles: &[SimHandle], ids: &[AnchorId]) -> Result<(), HostStatus> {
        let handle_ids: Vec<AnchorId> = handles.iter().map(|h| h.id).collect();
        self.journal()
            .erase_requests
            .push((handle_ids.clone(), ids.to_vec()));
        let delay = self.faults().erase_delay;
        self.pause(delay).await;

        if let Some(status) = self.faults().erase_failure {
            return Err(status);
        }
        self.vault
            .remove_all(handle_ids.iter().chain(ids.iter()))
            .map(|_| ())
            .map_err(|e| {
                warn!("sim: vault write failed: {:#}", e);
                status::STORAGE_IO
            })
    }

    fn release(&self, handle: &SimHandle) {
        handle.tracking.released.store(true, Ordering::SeqCst);
        let mut journal = self.journal();
        journal.live.remove(&handle.id);
        journal.released.push(handle.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr_anchors_core::Point3D;

    #[test]
    fn test_handle_localizes_after_configured_polls() {
        let host = SimulatedHost::new(SimConfig {
            polls_to_localize: Some(3),
            latency: Duration::ZERO,
        });
        let handle = host.create_anchor_at(Pose::identity());

        assert!(!handle.is_localized());
        assert!(!handle.is_localized());
        assert!(handle.is_localized());
    }

    #[test]
    fn test_never_localizing_host() {
        let host = SimulatedHost::new(SimConfig {
            polls_to_localize: None,
            latency: Duration::ZERO,
        });
        let handle = host.create_anchor_at(Pose::identity());
        assert!((0..100).all(|_| !handle.is_localized()));
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip_through_vault() {
        let host = SimulatedHost::default();
        let pose = Pose::from_position(Point3D::new(0.5, 1.5, -2.0));
        let handle = host.create_anchor_at(pose);

        host.save(&handle).await.unwrap();
        let unbound = host.load_unbound(&[handle.id()]).await.unwrap();
        assert_eq!(unbound.len(), 1);

        let localized = host.localize(&unbound[0]).await.unwrap();
        assert_eq!(localized, pose);
    }

    #[tokio::test]
    async fn test_failing_saves_are_consumed() {
        let host = SimulatedHost::default();
        host.fail_next_saves(1);
        let handle = host.create_anchor_at(Pose::identity());

        assert_eq!(host.save(&handle).await, Err(status::FAILURE));
        assert!(host.vault().is_empty());
        assert_eq!(host.save(&handle).await, Ok(()));
        assert_eq!(host.vault().len(), 1);
    }

    #[tokio::test]
    async fn test_load_skips_unknown_ids() {
        let host = SimulatedHost::default();
        let unbound = host.load_unbound(&[AnchorId::new_v4()]).await.unwrap();
        assert!(unbound.is_empty());
        assert_eq!(host.load_requests().len(), 1);
    }

    #[test]
    fn test_release_tracks_live_anchors() {
        let host = SimulatedHost::default();
        let handle = host.create_anchor_at(Pose::identity());
        assert_eq!(host.live_count(), 1);

        host.release(&handle);

        assert_eq!(host.live_count(), 0);
        assert!(handle.is_released());
        assert!(!handle.is_created());
        assert_eq!(host.released_ids(), vec![handle.id()]);
    }
}
