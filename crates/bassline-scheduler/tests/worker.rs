//! Hosted networks: requests, acknowledged notifications, resume.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::timeout;

use bassline_core::{Change, Contact, ContactId, GroupId, GroupState, MergeRegistry, NetworkState};
use bassline_scheduler::{
    build_scheduler, Command, NetworkWorker, Notification, Request, ResponseStatus, SchedulerConfig, SchedulerError,
    SchedulerPolicy, WorkerHandle,
};
use bassline_storage::{InMemoryStore, NetworkId, NetworkStore, StorageError};

/// A store shared with the test, with a switch that makes every save fail.
#[derive(Clone, Default)]
struct SharedStore {
    inner: Arc<Mutex<InMemoryStore>>,
    failing: Arc<AtomicBool>,
}

impl SharedStore {
    fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "disk unplugged".to_string(),
            });
        }
        Ok(())
    }

    fn saved(&self, network: &NetworkId) -> NetworkState {
        self.inner
            .lock()
            .unwrap()
            .load_network_state(network)
            .unwrap()
            .unwrap()
    }
}

impl NetworkStore for SharedStore {
    fn save_contact_content(
        &mut self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
        content: &Value,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.inner
            .lock()
            .unwrap()
            .save_contact_content(network, group, contact, content)
    }

    fn load_contact_content(
        &self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
    ) -> Result<Option<Value>, StorageError> {
        self.inner.lock().unwrap().load_contact_content(network, group, contact)
    }

    fn save_group_state(&mut self, network: &NetworkId, state: &GroupState) -> Result<(), StorageError> {
        self.check()?;
        self.inner.lock().unwrap().save_group_state(network, state)
    }

    fn load_group_state(&self, network: &NetworkId, group: &GroupId) -> Result<Option<GroupState>, StorageError> {
        self.inner.lock().unwrap().load_group_state(network, group)
    }

    fn save_network_state(&mut self, network: &NetworkId, state: &NetworkState) -> Result<(), StorageError> {
        self.check()?;
        self.inner.lock().unwrap().save_network_state(network, state)
    }

    fn load_network_state(&self, network: &NetworkId) -> Result<Option<NetworkState>, StorageError> {
        self.inner.lock().unwrap().load_network_state(network)
    }

    fn list_networks(&self) -> Result<Vec<NetworkId>, StorageError> {
        self.inner.lock().unwrap().list_networks()
    }

    fn delete_network(&mut self, network: &NetworkId) -> Result<(), StorageError> {
        self.inner.lock().unwrap().delete_network(network)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn root() -> GroupId {
    GroupId::from("root")
}

fn spawn(policy: SchedulerPolicy, store: Option<SharedStore>) -> WorkerHandle {
    init_tracing();
    let config = SchedulerConfig {
        batch_interval: Duration::from_millis(5),
        ..SchedulerConfig::default().with_policy(policy)
    };
    let scheduler = build_scheduler(
        &config,
        Arc::new(MergeRegistry::with_builtins()),
        NetworkState::with_root(root(), "root"),
    );
    let store = store.map(|s| Box::new(s) as Box<dyn NetworkStore>);
    let (handle, _join) = NetworkWorker::spawn(scheduler, store, NetworkId::from("net"), &config).unwrap();
    handle
}

async fn add_contact(handle: &WorkerHandle) -> ContactId {
    let data = handle
        .request(Command::AddContact {
            group_id: root(),
            content: Value::Null,
            blend_mode: Default::default(),
            name: None,
            boundary_direction: None,
        })
        .await
        .unwrap();
    serde_json::from_value(data["contactId"].clone()).unwrap()
}

async fn next(rx: &mut broadcast::Receiver<Notification>) -> Notification {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notification timed out")
        .unwrap()
}

#[tokio::test]
async fn requests_round_trip() {
    let handle = spawn(SchedulerPolicy::Immediate, None);
    let a = add_contact(&handle).await;
    let b = add_contact(&handle).await;

    let wire = handle
        .request(Command::Connect {
            from_id: a.clone(),
            to_id: b.clone(),
            wire_type: Default::default(),
        })
        .await
        .unwrap();
    assert!(wire["wireId"].is_string());

    handle
        .request(Command::ScheduleUpdate {
            contact_id: a.clone(),
            content: json!("hello"),
        })
        .await
        .unwrap();

    let contact = handle.request(Command::GetContact { contact_id: b }).await.unwrap();
    assert_eq!(contact["content"], json!("hello"));
}

#[tokio::test]
async fn raw_requests_report_errors_by_id() {
    let handle = spawn(SchedulerPolicy::Immediate, None);
    let request: Request = serde_json::from_value(json!({
        "id": "req-7",
        "type": "get-contact",
        "data": {"contactId": "missing"}
    }))
    .unwrap();

    let response = handle.send(request).await.unwrap();
    assert_eq!(response.id, "req-7");
    assert_eq!(response.status, ResponseStatus::Error);
    assert!(response.error.unwrap().contains("missing"));

    let garbled = Request {
        id: "req-8".to_string(),
        kind: "teleport".to_string(),
        data: Value::Null,
    };
    let err = handle.send(garbled).await.unwrap().into_result().unwrap_err();
    assert!(matches!(err, SchedulerError::Remote { id, .. } if id == "req-8"));
}

#[tokio::test]
async fn inconsistent_imports_are_refused() {
    let handle = spawn(SchedulerPolicy::Immediate, None);
    let a = add_contact(&handle).await;

    let mut state = serde_json::to_value(NetworkState::with_root(root(), "root")).unwrap();
    state["groups"]["root"]["group"]["boundaryContactIds"] = json!(["ghost"]);
    let request: Request = serde_json::from_value(json!({
        "id": "req-9",
        "type": "import-state",
        "data": {"state": state}
    }))
    .unwrap();

    let response = handle.send(request).await.unwrap();
    assert_eq!(response.status, ResponseStatus::Error);
    assert!(response.error.unwrap().contains("ghost"));

    // The running network is untouched and still accepts edits.
    let contact = handle.request(Command::GetContact { contact_id: a }).await.unwrap();
    assert_eq!(contact["groupId"], json!("root"));
    add_contact(&handle).await;
}

#[tokio::test]
async fn notifications_follow_persistence() {
    let store = SharedStore::default();
    let handle = spawn(SchedulerPolicy::Immediate, Some(store.clone()));
    let mut rx = handle.notifications();

    let a = add_contact(&handle).await;
    match next(&mut rx).await {
        Notification::Change {
            change: Change::ContactAdded { contact, .. },
            ..
        } => assert_eq!(contact.id, a),
        other => panic!("unexpected notification: {other:?}"),
    }

    handle
        .request(Command::ScheduleUpdate {
            contact_id: a.clone(),
            content: json!(42),
        })
        .await
        .unwrap();
    match next(&mut rx).await {
        Notification::Change {
            change: Change::ContactUpdated { content, .. },
            ..
        } => assert_eq!(content, json!(42)),
        other => panic!("unexpected notification: {other:?}"),
    }

    let saved = store.saved(&NetworkId::from("net"));
    assert_eq!(saved.get_contact(&a).unwrap().content, json!(42));
}

#[tokio::test]
async fn failed_saves_are_withheld_and_retried() {
    let store = SharedStore::default();
    let handle = spawn(SchedulerPolicy::Immediate, Some(store.clone()));
    let mut rx = handle.notifications();

    store.fail(true);
    let result = handle
        .request(Command::AddContact {
            group_id: root(),
            content: json!(1),
            blend_mode: Default::default(),
            name: Some("pending".to_string()),
            boundary_direction: None,
        })
        .await;
    assert!(matches!(result, Err(SchedulerError::Remote { .. })));
    assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));

    store.fail(false);
    handle.request(Command::Flush).await.unwrap();
    match next(&mut rx).await {
        Notification::Change {
            change: Change::ContactAdded { contact, .. },
            ..
        } => assert_eq!(contact.name.as_deref(), Some("pending")),
        other => panic!("unexpected notification: {other:?}"),
    }
    let saved = store.saved(&NetworkId::from("net"));
    assert_eq!(saved.contact_count(), 1);
}

#[tokio::test]
async fn resumes_saved_network() {
    let store = SharedStore::default();
    let mut state = NetworkState::with_root(root(), "root");
    state
        .add_contact(&root(), Contact::with_id(ContactId::from("kept"), root()).with_content(json!("saved")))
        .unwrap();
    store
        .clone()
        .save_network_state(&NetworkId::from("net"), &state)
        .unwrap();

    let handle = spawn(SchedulerPolicy::Batch, Some(store));
    let contact = handle
        .request(Command::GetContact {
            contact_id: ContactId::from("kept"),
        })
        .await
        .unwrap();
    assert_eq!(contact["content"], json!("saved"));
}

#[tokio::test]
async fn batch_worker_flushes_on_its_interval() {
    let handle = spawn(SchedulerPolicy::Batch, None);
    let a = add_contact(&handle).await;
    let mut rx = handle.notifications();

    handle
        .request(Command::ScheduleUpdate {
            contact_id: a.clone(),
            content: json!("later"),
        })
        .await
        .unwrap();

    match next(&mut rx).await {
        Notification::Change {
            change: Change::ContactUpdated { contact_id, content, .. },
            ..
        } => {
            assert_eq!(contact_id, a);
            assert_eq!(content, json!("later"));
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[tokio::test]
async fn refactors_broadcast_state_updates() {
    let store = SharedStore::default();
    let handle = spawn(SchedulerPolicy::Immediate, Some(store.clone()));
    let a = add_contact(&handle).await;
    let mut rx = handle.notifications();

    let data = handle
        .request(Command::ExtractToGroup {
            contact_ids: vec![a.clone()],
            group_name: "inner".to_string(),
            parent_group_id: root(),
        })
        .await
        .unwrap();
    let group_id: GroupId = serde_json::from_value(data["groupId"].clone()).unwrap();
    assert!(data["changes"].as_array().is_some_and(|c| !c.is_empty()));

    // The change log comes first, then a state update per touched group.
    let mut first = next(&mut rx).await;
    let mut logged = Vec::new();
    while let Notification::Change { change, .. } = first {
        logged.push(change);
        first = next(&mut rx).await;
    }
    assert!(logged
        .iter()
        .any(|c| matches!(c, Change::GroupAdded { group } if group.id == group_id)));
    assert!(matches!(&first, Notification::StateUpdate { group_id, .. } if group_id == &root()));
    match next(&mut rx).await {
        Notification::StateUpdate { group_id: id, state } => {
            assert_eq!(id, group_id);
            assert!(state.contacts.contains_key(&a));
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    let saved = store.saved(&NetworkId::from("net"));
    assert_eq!(saved.contact_group(&a), Some(&group_id));
}

#[tokio::test]
async fn dropping_handles_stops_the_worker() {
    init_tracing();
    let config = SchedulerConfig::default();
    let scheduler = build_scheduler(
        &config,
        Arc::new(MergeRegistry::with_builtins()),
        NetworkState::with_root(root(), "root"),
    );
    let (handle, join) = NetworkWorker::spawn(scheduler, None, NetworkId::from("net"), &config).unwrap();
    drop(handle);
    timeout(Duration::from_secs(2), join).await.unwrap().unwrap();
}
