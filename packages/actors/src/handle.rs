//! Starting the dispatcher and talking to it.

use std::path::PathBuf;
use std::sync::Arc;

use channel::{CorrelationClient, WorkChannel};
use motion_core::{DispatchError, DispatchEvent, DispatcherConfig, GenerationRequest, OriginId};
use ractor::{Actor, ActorRef};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{DispatcherActor, DispatcherArgs};
use crate::job_flow::JobContext;
use crate::messages::{DispatcherMessage, DispatcherSnapshot};
use crate::notifier::{Notifier, Outbox};
use crate::planner::RequestPlanner;

const EVENT_CAPACITY: usize = 1024;

/// What the dispatcher is wired to.
pub struct DispatcherDeps {
    pub channel: Arc<dyn WorkChannel>,
    pub planner: Arc<dyn RequestPlanner>,
    pub notifier: Arc<dyn Notifier>,
}

/// Cloneable front for the dispatcher actor.
#[derive(Clone)]
pub struct DispatcherHandle {
    actor: ActorRef<DispatcherMessage>,
    events: broadcast::Sender<DispatchEvent>,
}

impl DispatcherHandle {
    /// Submit a request for `origin_id`. Returns its queue position.
    pub async fn admit(
        &self,
        origin_id: OriginId,
        payload: GenerationRequest,
    ) -> Result<usize, DispatchError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(DispatcherMessage::Admit {
                origin_id,
                payload,
                reply: tx.into(),
            })
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| DispatchError::Unavailable("dispatcher dropped the request".into()))?
    }

    pub async fn snapshot(&self) -> Result<DispatcherSnapshot, DispatchError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(DispatcherMessage::Snapshot { reply: tx.into() })
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| DispatchError::Unavailable("dispatcher stopped".into()))
    }

    /// Every notice sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Refuse new requests, fail queued ones, cancel in-flight waits and
    /// stop once every worker has finished.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        self.actor
            .send_message(DispatcherMessage::Shutdown)
            .map_err(|e| DispatchError::Unavailable(e.to_string()))
    }

    pub fn actor(&self) -> &ActorRef<DispatcherMessage> {
        &self.actor
    }
}

/// Start the dispatcher and its workers.
pub async fn start_dispatcher(
    config: DispatcherConfig,
    deps: DispatcherDeps,
) -> Result<(DispatcherHandle, tokio::task::JoinHandle<()>), DispatchError> {
    config.validate()?;

    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let cancel = CancellationToken::new();
    let client = CorrelationClient::new(deps.channel)
        .with_poll_interval(config.poll_interval())
        .with_cancellation(cancel.clone());

    let ctx = Arc::new(JobContext {
        client,
        planner: deps.planner,
        outbox: Outbox::new(deps.notifier, events.clone()),
        generation_timeout: config.generation_timeout(),
        output_dir: PathBuf::from(&config.output_dir),
    });

    let args = DispatcherArgs {
        workers: config.workers,
        dispatch_backoff: config.dispatch_backoff(),
        status_interval: config.status_interval(),
        per_job_estimate: config.per_job_estimate(),
        ctx,
        cancel,
    };

    let (actor, handle) = Actor::spawn(None, DispatcherActor, args)
        .await
        .map_err(|e| DispatchError::Unavailable(format!("Failed to start dispatcher: {}", e)))?;

    Ok((DispatcherHandle { actor, events }, handle))
}
