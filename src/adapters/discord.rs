//! Discord webhook notifications
//!
//! Delivery target for pick reminders and award announcements. The
//! notifier seam keeps services testable without a live webhook.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{PickemError, Result};

/// Outbound notification seam
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, content: &str) -> Result<()>;
}

/// Discord webhook notifier
#[derive(Clone)]
pub struct DiscordWebhook {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl DiscordWebhook {
    pub fn new(webhook_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn send_text(&self, content: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookPayload { content })
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Discord notification sent");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Discord notification failed: {} - {}", status, body);
            Err(PickemError::Notification(format!("HTTP {status}: {body}")))
        }
    }
}
