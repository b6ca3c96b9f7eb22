//! Worker actor: runs one job flow at a time.

use std::sync::Arc;

use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::job_flow::{JobContext, run_job};
use crate::messages::{DispatcherMessage, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Dispatcher to report back to.
    pub dispatcher: ActorRef<DispatcherMessage>,
    /// Shared job dependencies.
    pub ctx: Arc<JobContext>,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub dispatcher: ActorRef<DispatcherMessage>,
    pub ctx: Arc<JobContext>,
}

/// Worker actor that runs leased requests.
///
/// Messages are handled one at a time, so a worker never runs two flows.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);
        Ok(WorkerActorState {
            worker_id: args.worker_id,
            dispatcher: args.dispatcher,
            ctx: args.ctx,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Process { entry } => {
                tracing::debug!(worker = %state.worker_id, origin = %entry.origin_id, "Processing request");
                run_job(&state.ctx, &entry).await;

                let finished = DispatcherMessage::JobFinished {
                    worker_id: state.worker_id.clone(),
                    origin_id: entry.origin_id,
                };
                if state.dispatcher.send_message(finished).is_err() {
                    tracing::debug!(worker = %state.worker_id, "Dispatcher gone, dropping completion");
                }
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
            }
        }

        Ok(())
    }
}
