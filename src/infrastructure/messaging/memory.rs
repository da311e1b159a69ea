//! In-process event channels

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::{ChannelError, EventChannel};
use crate::domain::MutationEvent;

/// Keeps every delivered event in memory. Can be switched into a failing
/// state to exercise error paths.
pub struct RecordingChannel {
    name: &'static str,
    events: Mutex<Vec<MutationEvent>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
    flushes: AtomicUsize,
}

impl RecordingChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            events: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<MutationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Delivery attempts, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn deliver(&self, event: &MutationEvent) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Connection(format!("{} is unavailable", self.name)));
        }
        self.events
            .lock()
            .map_err(|_| ChannelError::Publish("recording lock poisoned".into()))?
            .push(event.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), ChannelError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Stands in for a broker that is disabled in configuration.
pub struct NoopChannel {
    name: &'static str,
}

impl NoopChannel {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl EventChannel for NoopChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn deliver(&self, event: &MutationEvent) -> Result<(), ChannelError> {
        debug!(channel = self.name, action = %event.action, "Channel disabled, event skipped");
        Ok(())
    }
}
