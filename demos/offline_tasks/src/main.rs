//! Offline-first walkthrough.
//!
//! This demo shows the full lifecycle:
//! - Hydrating an empty local store from the remote
//! - Creating tasks while offline (reads and writes keep working)
//! - Reconnecting and draining the outbox
//! - A realtime notification pulling in another client's change
//!
//! Run with: cargo run -p offline_tasks

use satchel_engine::{
    forward_remote_events, CollectionRegistry, EngineConfig, MemoryRemote, RemoteStore,
    SyncCoordinator, SyncEvent,
};
use satchel_model::{
    ChangeEvent, CollectionName, ModelError, OwnerId, Record, RecordDocument, SyncAction,
};
use satchel_store::LocalStore;
use std::sync::Arc;
use std::time::Duration;

/// A task as the application models it.
#[derive(Debug)]
struct Task {
    title: String,
    done: bool,
}

impl Task {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            done: false,
        }
    }
}

impl RecordDocument for Task {
    const COLLECTION: &'static str = "tasks";

    fn into_record(self) -> Record {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!(self.title));
        fields.insert("done".into(), serde_json::json!(self.done));
        Record::new(OwnerId::new(), fields)
    }

    fn from_record(record: &Record) -> Result<Self, ModelError> {
        let title = record
            .field("title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ModelError::DocumentDecode {
                collection: Self::COLLECTION.to_string(),
                message: "missing title".to_string(),
            })?;
        let done = record
            .field("done")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Self {
            title: title.to_string(),
            done,
        })
    }
}

fn tasks() -> CollectionName {
    Task::collection()
}

/// Local write plus its outbox entry, the way an app layer would.
fn create_task(
    store: &LocalStore,
    coordinator: &SyncCoordinator,
    owner: OwnerId,
    title: &str,
) -> Record {
    let mut record = Task::new(title).into_record();
    record.owner = owner;
    store.put(&tasks(), record.clone()).expect("local put");
    coordinator.enqueue(tasks(), SyncAction::Insert, record.clone());
    record
}

fn show_tasks(label: &str, store: &LocalStore, owner: OwnerId) {
    println!("{label}:");
    for record in store.active(&tasks(), owner).expect("local read") {
        let task = Task::from_record(&record).expect("decode");
        println!("  [{}] {}", if task.done { "x" } else { " " }, task.title);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("offline_tasks=info,satchel_engine=debug")
        .init();

    let owner = OwnerId::new();
    let remote = Arc::new(MemoryRemote::new());
    let store = Arc::new(LocalStore::open_in_memory());
    let registry = Arc::new(CollectionRegistry::new().with::<Task>());

    // Someone else already has a task on the server.
    let mut seeded = Task::new("Water the plants").into_record();
    seeded.owner = owner;
    remote.seed(&tasks(), vec![seeded]);

    let coordinator = Arc::new(SyncCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        registry,
        owner,
        EngineConfig::default()
            .with_initial_kick(Duration::from_millis(50))
            .with_success_decay(Duration::from_millis(200)),
    ));
    let status = coordinator.status();

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(16);
    let runner = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.run(events_rx).await })
    };
    tokio::spawn(forward_remote_events(
        remote.subscribe(),
        events_tx.clone(),
    ));

    // Let the startup kick hydrate the empty store.
    tokio::time::sleep(Duration::from_millis(200)).await;
    show_tasks("After hydration", &store, owner);

    // Go offline; the app keeps working against the local store.
    println!("\n-- going offline --");
    remote.set_online(false);
    create_task(&store, &coordinator, owner, "Buy milk");
    create_task(&store, &coordinator, owner, "Book flights");
    show_tasks("While offline", &store, owner);
    println!(
        "  ({} mutations waiting in the outbox, remote still has {})",
        status.pending(),
        remote.records(&tasks()).len(),
    );

    // Reconnect: one event drains the outbox and catches up.
    println!("\n-- back online --");
    remote.set_online(true);
    events_tx.send(SyncEvent::Online).await.expect("send");
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!(
        "  status={:?}, pending={}, remote rows={}",
        status.current(),
        status.pending(),
        remote.records(&tasks()).len(),
    );

    // Another client writes straight to the remote; the realtime
    // notification pulls just that collection.
    println!("\n-- realtime change from another client --");
    let mut from_elsewhere = Task::new("Pick up parcel").into_record();
    from_elsewhere.owner = owner;
    remote.seed(&tasks(), vec![from_elsewhere]);
    remote.emit(ChangeEvent::changed(tasks()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    show_tasks("After realtime pull", &store, owner);

    events_tx.send(SyncEvent::Shutdown).await.expect("send");
    runner.await.expect("coordinator task");
}
