//! Delivery of change notifications.
//!
//! The engine hands notifications to a bounded queue and moves on. A worker
//! task drains the queue and posts each one to the configured webhook. A full
//! queue drops the notification; a failed delivery is logged.

use meshcon_metrics::{metric_defs, metrics};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::checker::Notification;
use crate::config::NotifierConfig;
use crate::error::SessionResult;

fn count(outcome: &'static str) {
    metrics::counter!(metric_defs::NOTIFICATIONS.name, "outcome" => outcome).increment(1);
}

/// Engine side of the notification queue.
#[derive(Debug, Clone)]
pub struct NotifierHandle {
    queue: mpsc::Sender<Notification>,
}

impl NotifierHandle {
    /// Create a handle and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (queue, receiver) = mpsc::channel(capacity);
        (NotifierHandle { queue }, receiver)
    }

    /// Queue a notification without waiting. Returns whether it was queued.
    pub fn notify(&self, notification: Notification) -> bool {
        match self.queue.try_send(notification) {
            Ok(()) => {
                count("queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(recipient = %dropped.recipient, text = %dropped.text, "notification queue full");
                count("dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                warn!(recipient = %dropped.recipient, text = %dropped.text, "notifier stopped");
                count("dropped");
                false
            }
        }
    }
}

/// Posts notifications to a messenger-style webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Option<String>,
    access_token: Option<String>,
}

impl WebhookNotifier {
    /// Build from config, reading the access token from the environment.
    pub fn from_config(config: &NotifierConfig) -> Self {
        let access_token = std::env::var(&config.access_token_env).ok();
        if config.endpoint.is_some() && access_token.is_none() {
            warn!(variable = %config.access_token_env, "notifier access token not set");
        }
        WebhookNotifier {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            access_token,
        }
    }

    /// JSON body sent for one notification.
    pub fn request_body(notification: &Notification) -> serde_json::Value {
        json!({
            "recipient": { "id": notification.recipient },
            "message": { "text": notification.text },
        })
    }

    /// Deliver one notification.
    pub async fn deliver(&self, notification: &Notification) -> SessionResult<()> {
        let Some(endpoint) = &self.endpoint else {
            info!(recipient = %notification.recipient, text = %notification.text, "notification");
            return Ok(());
        };

        let mut request = self.client.post(endpoint);
        if let Some(token) = &self.access_token {
            request = request.query(&[("access_token", token)]);
        }
        request
            .json(&Self::request_body(notification))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Drain the queue until every handle is dropped.
    pub async fn run(self, mut queue: mpsc::Receiver<Notification>) {
        while let Some(notification) = queue.recv().await {
            match self.deliver(&notification).await {
                Ok(()) => count("delivered"),
                Err(error) => {
                    warn!(%error, recipient = %notification.recipient, "notification failed");
                    count("failed");
                }
            }
        }
    }
}

/// Start the delivery worker.
pub fn spawn_notifier(config: &NotifierConfig) -> (NotifierHandle, JoinHandle<()>) {
    let (handle, queue) = NotifierHandle::channel(config.queue_capacity);
    let worker = WebhookNotifier::from_config(config);
    (handle, tokio::spawn(worker.run(queue)))
}
