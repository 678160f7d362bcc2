//! In-memory notifier for tests.

use super::{NotifyError, NotifyEvent, Notifier};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every event it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifyEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails with an HTTP 503.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Events delivered so far, in delivery order.
    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Http { status: 503 });
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}
