//! Dispatcher actor: admission, request queue, worker pool and status ticks.
//!
//! All admission and leasing decisions happen inside this actor's message
//! handler, so checking for a duplicate and enqueueing, or acquiring a
//! worker and dequeueing, are never interleaved with other requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use motion_core::{DispatchError, Notice, OriginId, QueueEntry};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::broadcaster::StatusBroadcaster;
use crate::job_flow::JobContext;
use crate::messages::{DispatcherMessage, DispatcherSnapshot, WorkerMessage};
use crate::notifier::Outbox;
use crate::pool::{WorkerHandle, WorkerPool};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Dispatcher actor arguments.
pub struct DispatcherArgs {
    pub workers: usize,
    pub dispatch_backoff: Duration,
    pub status_interval: Duration,
    pub per_job_estimate: Duration,
    pub ctx: Arc<JobContext>,
    /// Fired on shutdown to stop in-flight result polling.
    pub cancel: CancellationToken,
}

/// State for the dispatcher actor.
pub struct DispatcherState {
    admission: AdmissionController,
    pool: WorkerPool<ActorRef<WorkerMessage>>,
    /// Origin currently served by each leased worker.
    leases: HashMap<String, OriginId>,
    /// Worker ids by actor id, for supervision events.
    workers: HashMap<ActorId, String>,
    broadcaster: StatusBroadcaster,
    status_ticker: Option<JoinHandle<()>>,
    retry_scheduled: bool,
    dispatch_backoff: Duration,
    outbox: Outbox,
    ctx: Arc<JobContext>,
    cancel: CancellationToken,
    shutting_down: bool,
    /// Worker counter for unique IDs.
    worker_counter: u64,
}

impl DispatcherState {
    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}", self.worker_counter)
    }

    fn snapshot(&self) -> DispatcherSnapshot {
        let mut leased: Vec<OriginId> = self.leases.values().cloned().collect();
        leased.sort();
        DispatcherSnapshot {
            queued: self
                .admission
                .queue()
                .iter()
                .map(|e| e.origin_id.clone())
                .collect(),
            leased,
            available_workers: self.pool.available(),
            leased_workers: self.pool.leased(),
        }
    }

    /// Return the worker and clear its origin. No-op if already done.
    fn finish_lease(&mut self, worker_id: &str) -> Option<OriginId> {
        let origin_id = self.leases.remove(worker_id)?;
        self.pool.release(worker_id);
        self.admission.release(&origin_id);
        tracing::debug!(
            worker = worker_id,
            origin = %origin_id,
            available = self.pool.available(),
            leased = self.pool.leased(),
            "Released worker"
        );
        Some(origin_id)
    }
}

async fn spawn_worker(
    myself: &ActorRef<DispatcherMessage>,
    state: &mut DispatcherState,
) -> Result<WorkerHandle<ActorRef<WorkerMessage>>, ActorProcessingErr> {
    let worker_id = state.next_worker_id();
    let args = WorkerArgs {
        worker_id: worker_id.clone(),
        dispatcher: myself.clone(),
        ctx: state.ctx.clone(),
    };

    let (actor, _handle) = Actor::spawn_linked(None, WorkerActor, args, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

    state.workers.insert(actor.get_id(), worker_id.clone());
    Ok(WorkerHandle::new(worker_id, actor))
}

/// Lease workers to queued requests until one side runs out.
async fn dispatch_pending(myself: &ActorRef<DispatcherMessage>, state: &mut DispatcherState) {
    while state.admission.has_waiting() {
        let Some(handle) = state.pool.acquire() else {
            schedule_retry(myself, state);
            ensure_status_ticker(myself, state);
            return;
        };
        let Some(entry) = state.admission.next_entry() else {
            state.pool.release(&handle.id);
            return;
        };

        let origin_id = entry.origin_id.clone();
        state.leases.insert(handle.id.clone(), origin_id.clone());
        state.broadcaster.forget(&origin_id);
        tracing::info!(worker = %handle.id, origin = %origin_id, "Leased worker");

        state
            .outbox
            .send(
                &origin_id,
                Notice::Started {
                    worker_id: handle.id.clone(),
                },
            )
            .await;

        let process = WorkerMessage::Process {
            entry: Box::new(entry),
        };
        if let Err(e) = handle.worker.send_message(process) {
            tracing::warn!(worker = %handle.id, "Worker unreachable: {}", e);
            if let Some(origin_id) = state.finish_lease(&handle.id) {
                let error = DispatchError::WorkerCrashed(format!("{} unreachable", handle.id));
                state.outbox.send(&origin_id, Notice::Failed { error }).await;
            }
        }
    }
}

/// Retry dispatch after the backoff, unless a retry is already pending.
fn schedule_retry(myself: &ActorRef<DispatcherMessage>, state: &mut DispatcherState) {
    if state.retry_scheduled {
        return;
    }
    state.retry_scheduled = true;

    let myself = myself.clone();
    let backoff = state.dispatch_backoff;
    tokio::spawn(async move {
        tokio::time::sleep(backoff).await;
        let _ = myself.send_message(DispatcherMessage::Dispatch);
    });
}

/// Start the status tick the first time a request has to wait.
fn ensure_status_ticker(myself: &ActorRef<DispatcherMessage>, state: &mut DispatcherState) {
    if !state.broadcaster.should_start() {
        return;
    }

    let myself = myself.clone();
    let period = state.broadcaster.period();
    tracing::debug!("Starting status broadcaster every {:?}", period);
    state.status_ticker = Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            if myself
                .send_message(DispatcherMessage::BroadcastStatus)
                .is_err()
            {
                break;
            }
        }
    }));
}

fn stop_status_ticker(state: &mut DispatcherState) {
    if let Some(ticker) = state.status_ticker.take() {
        ticker.abort();
    }
    state.broadcaster.stopped();
}

async fn broadcast_status(state: &mut DispatcherState) {
    if !state.admission.has_waiting() {
        stop_status_ticker(state);
        return;
    }

    for (origin_id, notice) in state.broadcaster.statuses(state.admission.queue()) {
        let previous = state.broadcaster.previous(&origin_id).cloned();
        if let Some(reference) = state
            .outbox
            .update(previous.as_ref(), &origin_id, notice)
            .await
        {
            state.broadcaster.record(origin_id, reference);
        }
    }
}

/// Empty the request queue, releasing each origin and its status message.
fn drain_waiting(
    admission: &mut AdmissionController,
    broadcaster: &mut StatusBroadcaster,
) -> Vec<QueueEntry> {
    let drained = admission.drain_queue();
    for entry in &drained {
        broadcaster.forget(&entry.origin_id);
    }
    drained
}

/// A worker died outside the normal flow: release what it held, tell the
/// origin, and put a fresh worker in its place.
async fn replace_worker(
    myself: &ActorRef<DispatcherMessage>,
    state: &mut DispatcherState,
    actor_id: ActorId,
    reason: String,
) -> Result<(), ActorProcessingErr> {
    let Some(worker_id) = state.workers.remove(&actor_id) else {
        return Ok(());
    };
    let released = state.finish_lease(&worker_id);

    // Workers stopping during shutdown have already reported to their origin.
    if state.shutting_down {
        tracing::debug!(worker = %worker_id, "Worker stopped");
        return Ok(());
    }

    tracing::warn!(worker = %worker_id, "Worker terminated: {}", reason);
    if let Some(origin_id) = released {
        let error = DispatchError::WorkerCrashed(reason);
        state.outbox.send(&origin_id, Notice::Failed { error }).await;
    }

    let replacement = spawn_worker(myself, state).await?;
    tracing::info!(worker = %replacement.id, replaces = %worker_id, "Respawned worker");
    state.pool.replace(&worker_id, replacement);
    dispatch_pending(myself, state).await;
    Ok(())
}

/// Dispatcher actor that owns admission, the request queue and the pool.
pub struct DispatcherActor;

impl Actor for DispatcherActor {
    type Msg = DispatcherMessage;
    type State = DispatcherState;
    type Arguments = DispatcherArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting dispatcher with {} workers", args.workers);

        let mut state = DispatcherState {
            admission: AdmissionController::new(),
            pool: WorkerPool::new(Vec::new()),
            leases: HashMap::new(),
            workers: HashMap::new(),
            broadcaster: StatusBroadcaster::new(
                args.status_interval,
                args.per_job_estimate,
                args.workers,
            ),
            status_ticker: None,
            retry_scheduled: false,
            dispatch_backoff: args.dispatch_backoff,
            outbox: args.ctx.outbox.clone(),
            ctx: args.ctx,
            cancel: args.cancel,
            shutting_down: false,
            worker_counter: 0,
        };

        let mut handles = Vec::with_capacity(args.workers);
        for _ in 0..args.workers {
            handles.push(spawn_worker(&myself, &mut state).await?);
        }
        state.pool = WorkerPool::new(handles);

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DispatcherMessage::Admit {
                origin_id,
                payload,
                reply,
            } => {
                if state.shutting_down {
                    let _ = reply.send(Err(DispatchError::ShuttingDown));
                    return Ok(());
                }

                let busy = state.pool.leased();
                match state.admission.try_admit(origin_id.clone(), payload, busy) {
                    Ok(position) => {
                        tracing::info!(origin = %origin_id, position, "Admitted request");
                        state
                            .outbox
                            .send(&origin_id, Notice::Admitted { position })
                            .await;
                        let _ = reply.send(Ok(position));
                        dispatch_pending(&myself, state).await;
                    }
                    Err(e) => {
                        tracing::info!(origin = %origin_id, "Rejected duplicate request");
                        state.outbox.send(&origin_id, Notice::Rejected).await;
                        let _ = reply.send(Err(e));
                    }
                }
            }

            DispatcherMessage::Dispatch => {
                state.retry_scheduled = false;
                if !state.shutting_down {
                    dispatch_pending(&myself, state).await;
                }
            }

            DispatcherMessage::JobFinished {
                worker_id,
                origin_id,
            } => {
                match state.leases.get(&worker_id) {
                    Some(leased) if *leased == origin_id => {
                        state.finish_lease(&worker_id);
                    }
                    _ => {
                        tracing::warn!(worker = %worker_id, origin = %origin_id, "Completion for unknown lease");
                    }
                }
                if !state.shutting_down {
                    dispatch_pending(&myself, state).await;
                }
            }

            DispatcherMessage::BroadcastStatus => {
                broadcast_status(state).await;
            }

            DispatcherMessage::Snapshot { reply } => {
                let _ = reply.send(state.snapshot());
            }

            DispatcherMessage::Shutdown => {
                if state.shutting_down {
                    return Ok(());
                }
                tracing::info!("Shutting down dispatcher");
                state.shutting_down = true;
                stop_status_ticker(state);
                state.cancel.cancel();

                for entry in drain_waiting(&mut state.admission, &mut state.broadcaster) {
                    let error = DispatchError::ShuttingDown;
                    state
                        .outbox
                        .send(&entry.origin_id, Notice::Failed { error })
                        .await;
                }

                if state.workers.is_empty() {
                    myself.stop(None);
                    return Ok(());
                }
                for handle in state.pool.handles() {
                    let _ = handle.worker.send_message(WorkerMessage::Shutdown);
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorFailed(cell, err) => {
                replace_worker(&myself, state, cell.get_id(), err.to_string()).await?;
            }
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                let reason = reason.unwrap_or_else(|| "stopped".to_string());
                replace_worker(&myself, state, cell.get_id(), reason).await?;
            }
            _ => {}
        }

        if state.shutting_down && state.workers.is_empty() {
            tracing::info!("All workers stopped");
            myself.stop(None);
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        stop_status_ticker(state);
        state.cancel.cancel();
        Ok(())
    }
}
