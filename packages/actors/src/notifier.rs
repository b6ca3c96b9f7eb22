//! Delivery of caller-facing notices.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use motion_core::{DispatchEvent, Notice, OriginId};
use tokio::sync::broadcast;

/// Future type returned by notifier operations.
pub type NotifyFuture<'a> = BoxFuture<'a, Result<NoticeRef, NotifyError>>;

/// Identifies a delivered message so the transport can edit it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoticeRef {
    pub origin_id: OriginId,
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("transport cannot edit delivered messages")]
    EditUnsupported,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// The transport back to callers.
pub trait Notifier: Send + Sync + 'static {
    /// Send a new message to `origin_id`.
    fn notify<'a>(&'a self, origin_id: &'a OriginId, notice: &'a Notice) -> NotifyFuture<'a>;

    /// Edit a previously delivered message in place.
    fn replace<'a>(&'a self, previous: &'a NoticeRef, notice: &'a Notice) -> NotifyFuture<'a> {
        let _ = (previous, notice);
        async { Err(NotifyError::EditUnsupported) }.boxed()
    }
}

/// Notifier that only logs; for headless runs.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, origin_id: &'a OriginId, notice: &'a Notice) -> NotifyFuture<'a> {
        async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(origin = %origin_id, kind = notice.as_str(), "{}", notice);
            Ok(NoticeRef {
                origin_id: origin_id.clone(),
                message_id: id.to_string(),
            })
        }
        .boxed()
    }
}

/// Sends notices through the notifier and mirrors them onto the event
/// stream. Delivery failures are logged, never propagated: a caller that
/// cannot be reached must not stall the dispatcher.
#[derive(Clone)]
pub struct Outbox {
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<DispatchEvent>,
}

impl Outbox {
    pub fn new(notifier: Arc<dyn Notifier>, events: broadcast::Sender<DispatchEvent>) -> Self {
        Self { notifier, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub async fn send(&self, origin_id: &OriginId, notice: Notice) -> Option<NoticeRef> {
        let delivered = match self.notifier.notify(origin_id, &notice).await {
            Ok(reference) => Some(reference),
            Err(e) => {
                tracing::warn!(origin = %origin_id, kind = notice.as_str(), "Failed to notify caller: {}", e);
                None
            }
        };
        self.publish(origin_id, notice);
        delivered
    }

    /// Edit `previous` when the transport allows it, otherwise send anew.
    pub async fn update(
        &self,
        previous: Option<&NoticeRef>,
        origin_id: &OriginId,
        notice: Notice,
    ) -> Option<NoticeRef> {
        if let Some(previous) = previous {
            match self.notifier.replace(previous, &notice).await {
                Ok(reference) => {
                    self.publish(origin_id, notice);
                    return Some(reference);
                }
                Err(NotifyError::EditUnsupported) => {}
                Err(e) => {
                    tracing::debug!(origin = %origin_id, "Edit failed, sending new message: {}", e);
                }
            }
        }
        self.send(origin_id, notice).await
    }

    fn publish(&self, origin_id: &OriginId, notice: Notice) {
        let event = DispatchEvent::new(origin_id.clone(), notice);
        tracing::debug!("{}", event.description());
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
