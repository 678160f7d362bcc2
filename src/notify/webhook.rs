//! JSON webhook notifier.

use super::{NotifyError, NotifyEvent, Notifier};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// POSTs each event as JSON to a fixed URL.
///
/// Connection failures and 5xx/429 responses are retried with exponential
/// backoff for up to `max_elapsed`; other 4xx responses are not.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    max_elapsed: Duration,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(event)
                .send()
                .await
                .map_err(|e| {
                    warn!(url = %self.url, error = %e, "Webhook request failed");
                    backoff::Error::transient(NotifyError::Network(e.to_string()))
                })?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(NotifyError::Http {
                    status: status.as_u16(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(NotifyError::Http {
                    status: status.as_u16(),
                }));
            }

            debug!(event = event.name(), "Webhook delivered");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Money, ProductId};
    use crate::notify::WriteOffRecorded;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_unreachable_webhook_gives_up() {
        // Nothing listens on port 9 of localhost; the retry budget is tiny.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook".to_string())
            .with_max_elapsed(Duration::from_millis(50));
        let event = NotifyEvent::WriteOffRecorded(WriteOffRecorded {
            write_off_id: Uuid::new_v4(),
            product_id: ProductId::new(1),
            qty: 1,
            total_cost: Money::new(1),
            reason: None,
        });
        let result = notifier.notify(&event).await;
        assert!(matches!(result, Err(NotifyError::Network(_))));
    }
}
