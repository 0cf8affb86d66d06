//! A network owned by a background task.
//!
//! [`NetworkWorker`] owns one scheduler and, optionally, a store. Callers
//! reach it through a cloneable [`WorkerHandle`] with [`Request`]s and get
//! one [`Response`] per request. Changes are written to the store before
//! they are broadcast as [`Notification`]s, so a listener never sees a
//! change the store has not acknowledged. When a save fails the changes stay
//! in a backlog, the request is answered with an error, and the backlog is
//! retried after the next request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use bassline_core::{Change, Contact, CoreError, Group, GroupId};
use bassline_storage::{persist_changes, NetworkId, NetworkStore};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::protocol::{Command, Notification, Request, Response};
use crate::subscribers::Subscription;
use crate::traits::{Refactored, Scheduler};

#[derive(Debug)]
struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// What a command returned, and which groups it rebuilt wholesale.
struct Executed {
    data: Value,
    restructured: Vec<GroupId>,
}

impl Executed {
    fn data(data: Value) -> Self {
        Executed {
            data,
            restructured: Vec::new(),
        }
    }
}

pub struct NetworkWorker {
    scheduler: Box<dyn Scheduler>,
    store: Option<Box<dyn NetworkStore>>,
    network_id: NetworkId,
    collected: mpsc::UnboundedReceiver<Vec<Change>>,
    subscription: Option<Subscription>,
    backlog: Vec<Change>,
    stale_groups: Vec<GroupId>,
    needs_snapshot: bool,
    notifications: broadcast::Sender<Notification>,
    flush_interval: Option<Duration>,
}

impl NetworkWorker {
    /// Starts a worker for `network_id`.
    ///
    /// With a store, a previously saved network is resumed; otherwise the
    /// scheduler's current network is saved as the first snapshot.
    pub fn spawn(
        mut scheduler: Box<dyn Scheduler>,
        mut store: Option<Box<dyn NetworkStore>>,
        network_id: NetworkId,
        config: &SchedulerConfig,
    ) -> Result<(WorkerHandle, JoinHandle<()>), SchedulerError> {
        if let Some(store) = store.as_mut() {
            match store.load_network_state(&network_id)? {
                Some(state) => scheduler.import_state(state),
                None => store.save_network_state(&network_id, scheduler.network())?,
            }
        }

        let (collect_tx, collected) = mpsc::unbounded_channel();
        let subscription = scheduler.subscribe(Arc::new(move |changes: &[Change]| {
            // The receiver lives as long as the worker.
            let _ = collect_tx.send(changes.to_vec());
        }));

        let capacity = config.channel_capacity.max(1);
        let (request_tx, request_rx) = mpsc::channel(capacity);
        let (notifications, _) = broadcast::channel(capacity);
        let flush_interval = scheduler.policy().is_queued().then_some(config.batch_interval);

        tracing::info!(
            network = %network_id,
            policy = %scheduler.policy(),
            persistent = store.is_some(),
            "network worker started"
        );

        let worker = NetworkWorker {
            scheduler,
            store,
            network_id: network_id.clone(),
            collected,
            subscription: Some(subscription),
            backlog: Vec::new(),
            stale_groups: Vec::new(),
            needs_snapshot: false,
            notifications: notifications.clone(),
            flush_interval,
        };
        let join = tokio::spawn(worker.run(request_rx));

        let handle = WorkerHandle {
            network_id,
            requests: request_tx,
            notifications,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        Ok((handle, join))
    }

    async fn run(mut self, mut requests: mpsc::Receiver<Envelope>) {
        let mut ticker = self.flush_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                envelope = requests.recv() => match envelope {
                    Some(Envelope { request, reply }) => {
                        let response = self.respond(&request);
                        let _ = reply.send(response);
                    }
                    None => break,
                },
                _ = next_tick(&mut ticker) => self.flush_tick(),
            }
        }

        self.flush_tick();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        tracing::info!(network = %self.network_id, "network worker stopped");
    }

    fn respond(&mut self, request: &Request) -> Response {
        match self.handle(request) {
            Ok(data) => Response::success(request.id.clone(), data),
            Err(err) => {
                tracing::warn!(id = %request.id, kind = %request.kind, %err, "request failed");
                Response::failure(request.id.clone(), &err)
            }
        }
    }

    fn handle(&mut self, request: &Request) -> Result<Value, SchedulerError> {
        let command = request.command()?;
        let executed = self.execute(command)?;
        self.publish(executed.restructured)?;
        Ok(executed.data)
    }

    fn flush_tick(&mut self) {
        if self.scheduler.pending() > 0 {
            if let Err(err) = self.scheduler.flush() {
                tracing::warn!(%err, "scheduled flush failed");
            }
        }
        if let Err(err) = self.publish(Vec::new()) {
            tracing::warn!(%err, "publishing flushed changes failed");
        }
    }

    fn execute(&mut self, command: Command) -> Result<Executed, SchedulerError> {
        let scheduler = &mut self.scheduler;
        let executed = match command {
            Command::RegisterGroup { group } => {
                let id = scheduler.register_group(group)?;
                Executed::data(json!({ "groupId": id }))
            }
            Command::AddGroup {
                name,
                parent_id,
                primitive,
            } => {
                let parent = parent_id.unwrap_or_else(|| scheduler.network().root_group_id().clone());
                let mut group = Group::new(name, Some(parent));
                group.primitive = primitive;
                let id = scheduler.add_group(group)?;
                Executed::data(json!({ "groupId": id }))
            }
            Command::RemoveGroup { group_id } => {
                scheduler.remove_group(&group_id)?;
                Executed::data(Value::Null)
            }
            Command::AddContact {
                group_id,
                content,
                blend_mode,
                name,
                boundary_direction,
            } => {
                let mut contact = match boundary_direction {
                    Some(direction) => Contact::boundary(group_id.clone(), direction),
                    None => Contact::new(group_id.clone()),
                }
                .with_content(content)
                .with_blend_mode(blend_mode);
                contact.name = name;
                let id = scheduler.add_contact(&group_id, contact)?;
                Executed::data(json!({ "contactId": id }))
            }
            Command::RemoveContact { contact_id } => {
                scheduler.remove_contact(&contact_id)?;
                Executed::data(Value::Null)
            }
            Command::Connect {
                from_id,
                to_id,
                wire_type,
            } => {
                let id = scheduler.connect(&from_id, &to_id, wire_type)?;
                Executed::data(json!({ "wireId": id }))
            }
            Command::Disconnect { wire_id } => {
                scheduler.disconnect(&wire_id)?;
                Executed::data(Value::Null)
            }
            Command::ScheduleUpdate { contact_id, content } => {
                scheduler.schedule_update(&contact_id, content)?;
                Executed::data(Value::Null)
            }
            Command::SchedulePropagation {
                from_id,
                to_id,
                content,
            } => {
                scheduler.schedule_propagation(&from_id, &to_id, content)?;
                Executed::data(Value::Null)
            }
            Command::Flush => {
                let result = scheduler.flush()?;
                Executed::data(json!({
                    "changes": result.changes.len(),
                    "contradictions": result.contradictions,
                }))
            }
            Command::GetState { group_id } => Executed::data(serde_json::to_value(scheduler.get_state(&group_id)?)?),
            Command::GetContact { contact_id } => {
                let contact = scheduler
                    .get_contact(&contact_id)
                    .ok_or(CoreError::ContactNotFound { id: contact_id })?;
                Executed::data(serde_json::to_value(contact)?)
            }
            Command::GetWire { wire_id } => {
                let wire = scheduler
                    .get_wire(&wire_id)
                    .ok_or(CoreError::WireNotFound { id: wire_id })?;
                Executed::data(serde_json::to_value(wire)?)
            }
            Command::ExportState => Executed::data(serde_json::to_value(scheduler.export_state()?)?),
            Command::ImportState { state } => {
                let root = state.root_group_id().clone();
                scheduler.import_state(state);
                Executed {
                    data: Value::Null,
                    restructured: vec![root],
                }
            }
            Command::ExtractToGroup {
                contact_ids,
                group_name,
                parent_group_id,
            } => {
                let refactored = scheduler.extract_to_group(&contact_ids, &group_name, &parent_group_id)?;
                refactored_response(refactored, parent_group_id)?
            }
            Command::CopyGroup {
                group_id,
                target_parent_id,
                new_name,
                deep,
            } => {
                let refactored = scheduler.copy_group(&group_id, &target_parent_id, new_name.as_deref(), deep)?;
                refactored_response(refactored, target_parent_id)?
            }
            Command::CopySelection {
                contact_ids,
                group_ids,
                target_group_id,
                include_wires,
                deep,
            } => {
                let refactored = scheduler.copy_selection(
                    &contact_ids,
                    &group_ids,
                    &target_group_id,
                    include_wires,
                    deep,
                )?;
                refactored_response(refactored, target_group_id)?
            }
        };
        Ok(executed)
    }

    /// Persists everything not yet acknowledged, then broadcasts it.
    fn publish(&mut self, restructured: Vec<GroupId>) -> Result<(), SchedulerError> {
        while let Ok(batch) = self.collected.try_recv() {
            self.backlog.extend(batch);
        }
        if !restructured.is_empty() {
            self.needs_snapshot = true;
            for group_id in restructured {
                if !self.stale_groups.contains(&group_id) {
                    self.stale_groups.push(group_id);
                }
            }
        }
        if self.backlog.is_empty() && !self.needs_snapshot {
            return Ok(());
        }

        if let Some(store) = self.store.as_mut() {
            let state = self.scheduler.network();
            let saved = if self.needs_snapshot {
                store.save_network_state(&self.network_id, state)
            } else {
                persist_changes(&mut **store, &self.network_id, state, &self.backlog).map(|summary| {
                    tracing::debug!(?summary, "persisted changes");
                })
            };
            if let Err(err) = saved {
                tracing::warn!(
                    network = %self.network_id,
                    pending = self.backlog.len(),
                    %err,
                    "persistence failed; holding changes for retry"
                );
                return Err(err.into());
            }
        }

        for change in std::mem::take(&mut self.backlog) {
            let group_id = change.group_id().clone();
            // No listeners is not an error.
            let _ = self.notifications.send(Notification::Change { group_id, change });
        }
        for group_id in std::mem::take(&mut self.stale_groups) {
            if let Some(state) = self.scheduler.network().get_group(&group_id) {
                let _ = self.notifications.send(Notification::StateUpdate {
                    group_id,
                    state: state.clone(),
                });
            }
        }
        self.needs_snapshot = false;
        Ok(())
    }
}

fn refactored_response(refactored: Refactored, parent: GroupId) -> Result<Executed, SchedulerError> {
    let mut restructured = vec![parent];
    if let Some(group_id) = &refactored.group_id {
        restructured.push(group_id.clone());
    }
    let data = json!({
        "groupId": refactored.group_id,
        "changes": refactored.changes,
        "contactMap": serde_json::to_value(&refactored.maps.contacts)?,
        "groupMap": serde_json::to_value(&refactored.maps.groups)?,
    });
    Ok(Executed { data, restructured })
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Cloneable access to a running [`NetworkWorker`].
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    network_id: NetworkId,
    requests: mpsc::Sender<Envelope>,
    notifications: broadcast::Sender<Notification>,
    next_id: Arc<AtomicU64>,
}

impl WorkerHandle {
    pub fn network_id(&self) -> &NetworkId {
        &self.network_id
    }

    /// Sends a request and waits for its response.
    pub async fn send(&self, request: Request) -> Result<Response, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { request, reply })
            .await
            .map_err(|_| SchedulerError::WorkerClosed)?;
        response.await.map_err(|_| SchedulerError::WorkerClosed)
    }

    /// Sends `command` under a fresh request id and returns its payload.
    pub async fn request(&self, command: Command) -> Result<Value, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id.to_string(), &command)?;
        self.send(request).await?.into_result()
    }

    /// Listens for notifications sent from now on.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }
}
