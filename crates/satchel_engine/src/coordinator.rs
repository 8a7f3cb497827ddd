//! Sync coordinator: schedules cycles and reacts to events.

use crate::adapter::CollectionRegistry;
use crate::config::EngineConfig;
use crate::error::SyncResult;
use crate::hydrate::Hydrator;
use crate::pull::{PullEngine, PullReport};
use crate::push::{DrainReport, PushEngine};
use crate::remote::RemoteStore;
use crate::status::{StatusHandle, SyncStatus};
use satchel_model::{ChangeEvent, CollectionName, OwnerId, Record, SyncAction};
use satchel_store::{LocalStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// How often a locked store is retried before giving up on the session.
const OPEN_ATTEMPTS: u32 = 3;

/// Events that wake the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Connectivity was regained; run a full cycle.
    Online,
    /// An explicit request for a full cycle.
    SyncNow,
    /// The remote reported a change in one collection; pull only it.
    Realtime(CollectionName),
    /// Stop the run loop.
    Shutdown,
}

/// Outcome of one full sync cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Push phase outcome.
    pub drained: DrainReport,
    /// Pull phase outcome.
    pub pulled: PullReport,
}

/// Owns the push and pull engines and drives them on a schedule.
///
/// A cycle is always push then pull: local mutations reach the remote
/// before its state is read back, so a pull cannot resurrect a row the
/// outbox is about to delete. Cycles run on a periodic interval, after
/// a short startup kick, and on demand via [`SyncEvent`]s. All state
/// lives on the instance; independent coordinators never share timers
/// or status.
pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    push: PushEngine,
    pull: PullEngine,
    hydrator: Hydrator,
    status: StatusHandle,
    config: EngineConfig,
}

impl SyncCoordinator {
    /// Opens the backing store for a new session.
    ///
    /// Another session (a second process, or a tab that has not torn
    /// down yet) may still hold the store lock; retries with the
    /// configured delay before surfacing [`StoreError::Unavailable`].
    pub fn open_store(
        path: impl AsRef<Path>,
        config: &EngineConfig,
    ) -> Result<LocalStore, StoreError> {
        LocalStore::open_with_retry(path, config.open_retry_delay, OPEN_ATTEMPTS)
    }

    /// Creates a coordinator over a store, remote, and registry, scoped
    /// to one owner's data.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        registry: Arc<CollectionRegistry>,
        owner: OwnerId,
        config: EngineConfig,
    ) -> Self {
        Self {
            store: Arc::clone(&store),
            push: PushEngine::new(
                Arc::clone(&store),
                Arc::clone(&remote),
                Arc::clone(&registry),
                config.clone(),
            ),
            pull: PullEngine::new(
                Arc::clone(&store),
                Arc::clone(&remote),
                Arc::clone(&registry),
                owner,
            ),
            hydrator: Hydrator::new(store, remote, registry, owner),
            status: StatusHandle::new(),
            config,
        }
    }

    /// Returns the status handle for observers.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Queues a local mutation for the next drain and refreshes the
    /// published pending count.
    pub fn enqueue(&self, collection: CollectionName, action: SyncAction, payload: Record) {
        self.push.enqueue(collection, action, payload);
        self.publish_pending();
    }

    /// Runs one full cycle: hydrate (first run only), push, then pull.
    ///
    /// Publishes `Syncing` for the duration, `Success` or `Error` at
    /// the end, and the refreshed pending-mutation count either way.
    /// The decay from `Success` back to `Idle` is handled by the run
    /// loop's timer.
    pub fn sync_cycle(&self) -> SyncResult<CycleReport> {
        self.status.set(SyncStatus::Syncing);
        let result = self.cycle_inner();
        match &result {
            Ok(report) => {
                tracing::debug!(
                    settled = report.drained.settled,
                    applied = report.pulled.applied,
                    "sync cycle complete"
                );
                self.status.set(SyncStatus::Success);
            }
            Err(error) => {
                tracing::warn!(%error, "sync cycle failed");
                self.status.set(SyncStatus::Error);
            }
        }
        self.publish_pending();
        result
    }

    fn cycle_inner(&self) -> SyncResult<CycleReport> {
        self.hydrator.hydrate_all();
        let drained = self.push.drain()?;
        let pulled = self.pull.pull_all()?;
        Ok(CycleReport { drained, pulled })
    }

    fn publish_pending(&self) {
        match self.store.outbox_len() {
            Ok(pending) => self.status.set_pending(pending),
            Err(_) => self.status.set_pending(0),
        }
    }

    /// Pulls a single collection in response to a realtime event.
    ///
    /// Deliberately narrow: no push phase, no status churn, just the
    /// named collection catching up.
    pub fn targeted_pull(&self, collection: &CollectionName) -> SyncResult<PullReport> {
        self.pull.pull(collection)
    }

    /// Runs the event loop until `Shutdown` or the sender goes away.
    ///
    /// Schedules the startup kick, the periodic interval, and the
    /// success display decay as cancellable timers inside one select
    /// loop, so dropping the returned future tears everything down.
    pub async fn run(&self, mut events: mpsc::Receiver<SyncEvent>) {
        let period = self.config.sync_interval.max(std::time::Duration::from_millis(10));
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.initial_kick,
            period,
        );
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut decay_at: Option<tokio::time::Instant> = None;

        loop {
            let decay_timer = async {
                match decay_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = interval.tick() => {
                    self.cycle_with_decay(&mut decay_at);
                }
                () = decay_timer => {
                    if self.status.current() == SyncStatus::Success {
                        self.status.set(SyncStatus::Idle);
                    }
                    decay_at = None;
                }
                event = events.recv() => match event {
                    Some(SyncEvent::Online) | Some(SyncEvent::SyncNow) => {
                        self.cycle_with_decay(&mut decay_at);
                    }
                    Some(SyncEvent::Realtime(collection)) => {
                        if let Err(error) = self.targeted_pull(&collection) {
                            tracing::warn!(%collection, %error, "realtime pull failed");
                        }
                    }
                    Some(SyncEvent::Shutdown) | None => {
                        tracing::debug!("coordinator shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn cycle_with_decay(&self, decay_at: &mut Option<tokio::time::Instant>) {
        if self.sync_cycle().is_ok() {
            *decay_at = Some(tokio::time::Instant::now() + self.config.success_decay);
        } else {
            *decay_at = None;
        }
    }
}

/// Forwards remote change notifications into a coordinator's event
/// queue as targeted pulls.
///
/// Runs until the remote drops its broadcast sender or the coordinator
/// side closes. Lagged subscribers resubscribe implicitly: a missed
/// notification is recovered by the next periodic cycle anyway.
pub async fn forward_remote_events(
    mut notifications: broadcast::Receiver<ChangeEvent>,
    events: mpsc::Sender<SyncEvent>,
) {
    loop {
        match notifications.recv().await {
            Ok(change) => {
                if events
                    .send(SyncEvent::Realtime(change.collection))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "realtime notifications lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use satchel_model::{ModelError, OutboxEntry, OwnerId, Record, RecordDocument, SyncAction};
    use std::time::Duration;

    struct Task;

    impl RecordDocument for Task {
        const COLLECTION: &'static str = "tasks";

        fn into_record(self) -> Record {
            unreachable!("tests only decode")
        }

        fn from_record(_record: &Record) -> Result<Self, ModelError> {
            Ok(Self)
        }
    }

    struct Page;

    impl RecordDocument for Page {
        const COLLECTION: &'static str = "pages";

        fn into_record(self) -> Record {
            unreachable!("tests only decode")
        }

        fn from_record(_record: &Record) -> Result<Self, ModelError> {
            Ok(Self)
        }
    }

    fn tasks() -> CollectionName {
        CollectionName::new("tasks").unwrap()
    }

    fn pages() -> CollectionName {
        CollectionName::new("pages").unwrap()
    }

    fn owner() -> OwnerId {
        OwnerId::from_uuid(uuid::Uuid::from_u128(42))
    }

    fn titled(title: &str) -> Record {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!(title));
        Record::new(owner(), fields)
    }

    fn coordinator_with(
        remote: Arc<MemoryRemote>,
        config: EngineConfig,
    ) -> (Arc<LocalStore>, SyncCoordinator) {
        let store = Arc::new(LocalStore::open_in_memory());
        let registry = Arc::new(CollectionRegistry::new().with::<Task>().with::<Page>());
        let coordinator =
            SyncCoordinator::new(Arc::clone(&store), remote, registry, owner(), config);
        (store, coordinator)
    }

    fn coordinator(remote: Arc<MemoryRemote>) -> (Arc<LocalStore>, SyncCoordinator) {
        coordinator_with(remote, EngineConfig::immediate())
    }

    #[test]
    fn cycle_pushes_before_pulling() {
        let remote = Arc::new(MemoryRemote::new());
        let (store, coordinator) = coordinator(Arc::clone(&remote));

        let local = titled("local edit");
        store.put(&tasks(), local.clone()).unwrap();
        store
            .outbox_push(OutboxEntry::new(tasks(), SyncAction::Insert, local.clone()))
            .unwrap();
        remote.seed(&pages(), vec![titled("remote page")]);

        let report = coordinator.sync_cycle().unwrap();
        assert_eq!(report.drained.settled, 1);
        assert!(report.pulled.applied >= 1);
        assert!(remote.record(&tasks(), local.id).is_some());
        assert_eq!(coordinator.status().current(), SyncStatus::Success);
    }

    #[test]
    fn failed_cycle_reports_error_status() {
        let remote = Arc::new(MemoryRemote::new());
        let (store, coordinator) = coordinator(Arc::clone(&remote));

        store
            .outbox_push(OutboxEntry::new(
                tasks(),
                SyncAction::Insert,
                titled("stranded"),
            ))
            .unwrap();
        remote.set_online(false);

        assert!(coordinator.sync_cycle().is_err());
        assert_eq!(coordinator.status().current(), SyncStatus::Error);
        assert_eq!(store.outbox_len().unwrap(), 1);
    }

    #[test]
    fn open_store_retries_while_the_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satchel.journal");
        let config = EngineConfig::default().with_open_retry_delay(Duration::from_millis(1));

        let holder = SyncCoordinator::open_store(&path, &config).unwrap();
        assert!(matches!(
            SyncCoordinator::open_store(&path, &config),
            Err(satchel_store::StoreError::Unavailable { .. })
        ));

        drop(holder);
        let reopened = SyncCoordinator::open_store(&path, &config).unwrap();
        assert!(reopened.is_open());
    }

    #[test]
    fn pending_count_tracks_the_outbox() {
        let remote = Arc::new(MemoryRemote::new());
        let (store, coordinator) = coordinator(Arc::clone(&remote));
        let status = coordinator.status();

        coordinator.enqueue(tasks(), SyncAction::Insert, titled("one"));
        coordinator.enqueue(tasks(), SyncAction::Insert, titled("two"));
        assert_eq!(status.pending(), 2);

        coordinator.sync_cycle().unwrap();
        assert_eq!(status.pending(), 0);
        assert_eq!(store.outbox_len().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_kicks_and_decays() {
        let remote = Arc::new(MemoryRemote::new());
        let (_store, coordinator) = coordinator(Arc::clone(&remote));
        remote.seed(&tasks(), vec![titled("seeded")]);

        let status = coordinator.status();
        let (tx, rx) = mpsc::channel(8);

        let run = coordinator.run(rx);
        tokio::pin!(run);

        // Let the startup kick fire.
        tokio::select! {
            _ = &mut run => unreachable!("loop exited early"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        assert_ne!(status.current(), SyncStatus::Syncing);

        tx.send(SyncEvent::Shutdown).await.unwrap();
        run.await;
        // After the decay timer, success has settled back to idle.
        assert!(matches!(
            status.current(),
            SyncStatus::Idle | SyncStatus::Success
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_event_pulls_only_its_collection() {
        let remote = Arc::new(MemoryRemote::new());
        // Park the scheduled timers so only the event path can run.
        let config = EngineConfig::immediate()
            .with_initial_kick(Duration::from_secs(3600))
            .with_sync_interval(Duration::from_secs(3600));
        let (store, coordinator) = coordinator_with(Arc::clone(&remote), config);

        // Warm both caches so hydration stays out of the picture.
        store.put(&tasks(), titled("warm task")).unwrap();
        store.put(&pages(), titled("warm page")).unwrap();

        let remote_task = titled("new task");
        let remote_page = titled("new page");
        remote.seed(&tasks(), vec![remote_task.clone()]);
        remote.seed(&pages(), vec![remote_page.clone()]);

        let (tx, rx) = mpsc::channel(8);
        // A long initial kick keeps the periodic cycle from firing.
        let run = coordinator.run(rx);
        tokio::pin!(run);

        tx.send(SyncEvent::Realtime(tasks())).await.unwrap();
        tokio::select! {
            _ = &mut run => unreachable!("loop exited early"),
            _ = tokio::time::sleep(Duration::from_millis(1)) => {}
        }

        tx.send(SyncEvent::Shutdown).await.unwrap();
        run.await;

        assert!(store.get(&tasks(), remote_task.id).unwrap().is_some());
        assert!(store.get(&pages(), remote_page.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_events_are_forwarded() {
        let remote = Arc::new(MemoryRemote::new());
        let (tx, mut rx) = mpsc::channel(8);

        let notifications = remote.subscribe();
        let forwarder = tokio::spawn(forward_remote_events(notifications, tx));

        remote.emit(ChangeEvent::changed(tasks()));
        let event = rx.recv().await.unwrap();
        assert_eq!(event, SyncEvent::Realtime(tasks()));

        drop(remote);
        forwarder.await.unwrap();
    }
}
