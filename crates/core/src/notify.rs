//! Notification subsystem for conflict alerts and failed sync cycles.
//!
//! Every notice is logged via `tracing`; if a webhook URL is configured, a
//! JSON payload is also delivered there. The [`Notifier`] facade logs
//! delivery failures without aborting; a sync cycle never fails because a
//! notification did.

use tracing::{info, warn};

use crate::config::NotificationConfig;
use crate::errors::NotificationError;
use crate::models::{Conflict, CycleStats};

/// Unified notifier dispatching to the configured channels.
pub struct Notifier {
    webhook: Option<WebhookNotifier>,
}

impl Notifier {
    /// Create a new notifier from the notification configuration.
    pub fn new(config: &NotificationConfig) -> Self {
        let webhook = config.webhook_url.as_ref().map(|url| {
            info!("webhook notifications enabled");
            WebhookNotifier::new(url.clone())
        });
        Self { webhook }
    }

    /// Announce the conflicts applied by one sync cycle.
    ///
    /// Informational only: the server-wins resolution already happened by the
    /// time this is called.
    pub async fn notify_conflicts(&self, conflicts: &[Conflict]) {
        for conflict in conflicts {
            info!(
                conflict_id = %conflict.id,
                quote_id = %conflict.local.id,
                local_text = %conflict.local.text,
                remote_text = %conflict.remote.text,
                "conflict resolved in favour of remote"
            );
        }

        if let Some(ref webhook) = self.webhook {
            if conflicts.is_empty() {
                return;
            }
            let payload = serde_json::json!({
                "event": "conflicts_detected",
                "count": conflicts.len(),
                "conflicts": conflicts
                    .iter()
                    .map(|c| serde_json::json!({
                        "id": c.id,
                        "quote_id": c.local.id,
                        "local_text": c.local.text,
                        "remote_text": c.remote.text,
                    }))
                    .collect::<Vec<_>>(),
            });
            if let Err(e) = webhook.send(&payload).await {
                warn!(error = %e, "conflict webhook delivery failed");
            }
        }
    }

    /// Announce that a sync cycle did not complete.
    pub async fn notify_cycle_failed(&self, error: &str) {
        warn!(error, "sync cycle did not complete");

        if let Some(ref webhook) = self.webhook {
            let payload = serde_json::json!({
                "event": "sync_failed",
                "error": error,
            });
            if let Err(e) = webhook.send(&payload).await {
                warn!(error = %e, "failure webhook delivery failed");
            }
        }
    }

    /// Announce a completed cycle summary (only when something changed).
    pub async fn notify_cycle_completed(&self, stats: &CycleStats) {
        if !stats.changed {
            return;
        }
        if let Some(ref webhook) = self.webhook {
            let payload = serde_json::json!({
                "event": "sync_completed",
                "remote_items": stats.remote_items,
                "conflicts": stats.conflicts,
                "admitted": stats.admitted,
                "attached": stats.attached,
            });
            if let Err(e) = webhook.send(&payload).await {
                warn!(error = %e, "summary webhook delivery failed");
            }
        }
    }
}

/// Incoming-webhook channel.
struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    async fn send(&self, payload: &serde_json::Value) -> Result<(), NotificationError> {
        let resp = self.http.post(&self.url).json(payload).send().await?;
        if !resp.status().is_success() {
            return Err(NotificationError::WebhookError(format!(
                "webhook returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
