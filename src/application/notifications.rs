//! Mutation event fan-out
//!
//! Every event goes to the log-topic channel and the fanout channel
//! concurrently. Delivery failures are logged and counted, never returned
//! to the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::ports::{ChannelError, EventChannel};
use crate::domain::MutationEvent;
use crate::shared::{retry_with_backoff, RetryConfig};

/// How `dispatch` hands events to the channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Queue the event for a worker task and return immediately.
    #[default]
    Background,
    /// Await delivery to both channels before returning.
    Inline,
}

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub mode: DispatchMode,
    pub queue_capacity: usize,
    pub retry: RetryConfig,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Background,
            queue_capacity: 1024,
            retry: RetryConfig::default(),
        }
    }
}

struct Channels {
    log: Arc<dyn EventChannel>,
    fanout: Arc<dyn EventChannel>,
    retry: RetryConfig,
}

impl Channels {
    async fn deliver_all(&self, event: &MutationEvent) {
        tokio::join!(
            deliver_one(self.log.as_ref(), event, &self.retry),
            deliver_one(self.fanout.as_ref(), event, &self.retry),
        );
    }

    async fn flush_all(&self) {
        for channel in [&self.log, &self.fanout] {
            if let Err(e) = channel.flush().await {
                error!(channel = channel.name(), error = %e, "Failed to flush channel");
            }
        }
    }
}

async fn deliver_one(channel: &dyn EventChannel, event: &MutationEvent, retry: &RetryConfig) {
    let name = channel.name();
    let result = retry_with_backoff(
        retry,
        move || channel.deliver(event),
        ChannelError::is_retryable,
        name,
    )
    .await;

    match result {
        Ok(()) => {
            debug!(channel = name, action = %event.action, "Event delivered");
            metrics::counter!("tariff_notifications_total", "channel" => name, "outcome" => "ok")
                .increment(1);
        }
        Err(e) => {
            error!(
                channel = name,
                action = %event.action,
                tariff_id = ?event.tariff_id,
                date_accession_id = ?event.date_accession_id,
                error = %e,
                "Event delivery failed"
            );
            metrics::counter!("tariff_notifications_total", "channel" => name, "outcome" => "error")
                .increment(1);
        }
    }
}

pub struct NotificationDispatcher {
    channels: Arc<Channels>,
    mode: DispatchMode,
    sender: Mutex<Option<mpsc::Sender<MutationEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationDispatcher {
    /// In background mode this spawns the worker task, so it must be
    /// called inside a tokio runtime.
    pub fn new(
        log: Arc<dyn EventChannel>,
        fanout: Arc<dyn EventChannel>,
        options: DispatcherOptions,
    ) -> Self {
        let channels = Arc::new(Channels {
            log,
            fanout,
            retry: options.retry,
        });

        let (sender, worker) = match options.mode {
            DispatchMode::Inline => (None, None),
            DispatchMode::Background => {
                let (tx, mut rx) = mpsc::channel::<MutationEvent>(options.queue_capacity.max(1));
                let worker_channels = channels.clone();
                let handle = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        worker_channels.deliver_all(&event).await;
                    }
                    debug!("Notification worker stopped");
                });
                (Some(tx), Some(handle))
            }
        };

        Self {
            channels,
            mode: options.mode,
            sender: Mutex::new(sender),
            worker: Mutex::new(worker),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Hand an event to both channels. Never fails.
    pub async fn dispatch(&self, event: MutationEvent) {
        match self.mode {
            DispatchMode::Inline => self.channels.deliver_all(&event).await,
            DispatchMode::Background => {
                let guard = self.sender.lock().await;
                let Some(tx) = guard.as_ref() else {
                    warn!(action = %event.action, "Dispatcher is shut down, event dropped");
                    metrics::counter!("tariff_notifications_dropped_total").increment(1);
                    return;
                };
                match tx.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(event)) => {
                        warn!(
                            action = %event.action,
                            tariff_id = ?event.tariff_id,
                            "Notification queue full, event dropped"
                        );
                        metrics::counter!("tariff_notifications_dropped_total").increment(1);
                    }
                    Err(mpsc::error::TrySendError::Closed(event)) => {
                        warn!(action = %event.action, "Notification worker gone, event dropped");
                        metrics::counter!("tariff_notifications_dropped_total").increment(1);
                    }
                }
            }
        }
    }

    /// Drain queued events, then flush channel buffers. Later dispatches
    /// in background mode are dropped.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!("Notification worker panicked: {}", e);
            }
        }

        self.channels.flush_all().await;
        info!("Notification dispatcher stopped");
    }
}
