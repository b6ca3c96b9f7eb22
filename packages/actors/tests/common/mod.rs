#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{
    DispatcherDeps, DispatcherHandle, FnPlanner, NoticeRef, Notifier, NotifyFuture, PlanError, PlanFuture,
    RequestPlanner, start_dispatcher,
};
use channel::MemoryChannel;
use futures_util::FutureExt;
use motion_core::{
    DispatchEvent, DispatcherConfig, GenerationRequest, GenerationResult, Notice, OriginId,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// Notifier that records every delivery and supports edits.
#[derive(Default)]
pub struct RecordingNotifier {
    next_id: AtomicU64,
    sent: Mutex<Vec<(OriginId, Notice)>>,
    edited: Mutex<Vec<(NoticeRef, Notice)>>,
}

impl RecordingNotifier {
    pub fn sent_to(&self, origin: &OriginId) -> Vec<Notice> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| o == origin)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn edits(&self) -> Vec<(NoticeRef, Notice)> {
        self.edited.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, origin_id: &'a OriginId, notice: &'a Notice) -> NotifyFuture<'a> {
        async move {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.sent
                .lock()
                .unwrap()
                .push((origin_id.clone(), notice.clone()));
            Ok(NoticeRef {
                origin_id: origin_id.clone(),
                message_id: id.to_string(),
            })
        }
        .boxed()
    }

    fn replace<'a>(&'a self, previous: &'a NoticeRef, notice: &'a Notice) -> NotifyFuture<'a> {
        async move {
            self.edited
                .lock()
                .unwrap()
                .push((previous.clone(), notice.clone()));
            Ok(previous.clone())
        }
        .boxed()
    }
}

/// Stand-in for the external generation worker.
///
/// The request prompt becomes the single input ref and decides the outcome:
/// `fail*` reports a failure, `missing*` reports an output that was never
/// written, `hang*` never answers, anything else writes the file and reports
/// it by relative path.
pub fn spawn_generation_worker(memory: Arc<MemoryChannel>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(job) = memory.take_task().await else {
                tokio::time::sleep(Duration::from_millis(5)).await;
                continue;
            };
            let prompt = job.input_refs.first().cloned().unwrap_or_default();
            let memory = memory.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if prompt.starts_with("hang") {
                    return;
                }
                memory
                    .push_result(GenerationResult::progress(
                        job.job_id,
                        motion_core::JobStatus::Processing,
                    ))
                    .await;
                tokio::time::sleep(Duration::from_millis(50)).await;

                let result = if prompt.starts_with("fail") {
                    GenerationResult::failed(job.job_id, "model crashed")
                } else if prompt.starts_with("missing") {
                    GenerationResult::completed(job.job_id, "never-written.mp4")
                } else {
                    let name = format!("{}.mp4", job.job_id);
                    let path = Path::new(&job.output_dir).join(&name);
                    tokio::fs::write(&path, b"video").await.unwrap();
                    GenerationResult::completed(job.job_id, name)
                };
                memory.push_result(result.with_service_id("test-gpu")).await;
            });
        }
    })
}

pub fn echo_planner() -> Arc<dyn RequestPlanner> {
    Arc::new(FnPlanner::new(|request: &GenerationRequest| {
        let refs = vec![request.prompt.clone()];
        Box::pin(async move { Ok::<_, PlanError>(refs) }) as PlanFuture
    }))
}

pub fn test_config(output_dir: &Path) -> DispatcherConfig {
    DispatcherConfig::default()
        .with_workers(1)
        .with_generation_timeout(Duration::from_secs(3))
        .with_poll_interval(Duration::from_millis(10))
        .with_dispatch_backoff(Duration::from_millis(10))
        .with_status_interval(Duration::from_millis(100))
        .with_per_job_estimate(Duration::from_secs(300))
        .with_output_dir(output_dir.to_string_lossy())
}

pub struct Harness {
    pub dispatcher: DispatcherHandle,
    pub join: JoinHandle<()>,
    pub notifier: Arc<RecordingNotifier>,
    pub memory: Arc<MemoryChannel>,
    pub events: broadcast::Receiver<DispatchEvent>,
    pub output_dir: tempfile::TempDir,
    generation_worker: JoinHandle<()>,
}

impl Harness {
    pub async fn start(
        configure: impl FnOnce(DispatcherConfig) -> DispatcherConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with(configure, echo_planner()).await
    }

    pub async fn start_with(
        configure: impl FnOnce(DispatcherConfig) -> DispatcherConfig,
        planner: Arc<dyn RequestPlanner>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let output_dir = tempfile::tempdir()?;
        let memory = Arc::new(MemoryChannel::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let config = configure(test_config(output_dir.path()));
        let (dispatcher, join) = start_dispatcher(
            config,
            DispatcherDeps {
                channel: memory.clone(),
                planner,
                notifier: notifier.clone(),
            },
        )
        .await?;
        let events = dispatcher.subscribe();
        let generation_worker = spawn_generation_worker(memory.clone());

        Ok(Self {
            dispatcher,
            join,
            notifier,
            memory,
            events,
            output_dir,
            generation_worker,
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.path().to_path_buf()
    }

    /// Wait for the next event matching `pred`, skipping others.
    pub async fn wait_for(
        &mut self,
        mut pred: impl FnMut(&DispatchEvent) -> bool,
    ) -> Result<DispatchEvent, Box<dyn std::error::Error>> {
        let found = tokio::time::timeout(WAIT, async {
            loop {
                match self.events.recv().await {
                    Ok(event) if pred(&event) => return Ok(event),
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await??;
        Ok(found)
    }

    /// Wait for the final notice sent to `origin`.
    pub async fn wait_final(
        &mut self,
        origin: &OriginId,
    ) -> Result<Notice, Box<dyn std::error::Error>> {
        let origin = origin.clone();
        let event = self
            .wait_for(|e| e.origin_id == origin && e.notice.is_final())
            .await?;
        Ok(event.notice)
    }
}

impl Harness {
    /// Wait until every origin in `origins` got its final notice, in any order.
    pub async fn wait_finals(
        &mut self,
        origins: &[OriginId],
    ) -> Result<HashMap<OriginId, Notice>, Box<dyn std::error::Error>> {
        let mut finals = HashMap::new();
        while finals.len() < origins.len() {
            let event = self
                .wait_for(|e| origins.contains(&e.origin_id) && e.notice.is_final())
                .await?;
            finals.insert(event.origin_id, event.notice);
        }
        Ok(finals)
    }

    /// Wait until the dispatcher has released `origin`.
    pub async fn wait_released(
        &self,
        origin: &OriginId,
    ) -> Result<(), Box<dyn std::error::Error>> {
        tokio::time::timeout(WAIT, async {
            loop {
                if !self.dispatcher.snapshot().await?.is_pending(origin) {
                    return Ok::<_, Box<dyn std::error::Error>>(());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.generation_worker.abort();
        let _ = self.dispatcher.shutdown();
    }
}

pub fn origin(id: &str) -> OriginId {
    OriginId::from(id)
}

pub fn request(prompt: &str) -> GenerationRequest {
    GenerationRequest::new(prompt)
}
