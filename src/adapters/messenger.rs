//! Outbound delivery seam and webhook implementation
//!
//! Delivery is two steps so the schedulers can isolate failures per
//! group: resolve the group's sendable handle, then push a snapshot at
//! it. The webhook implementation renders snapshots as plain text.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::Snapshot;
use crate::error::{Result, WatchError};

/// Sendable handle for one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTarget {
    pub group_id: String,
    pub endpoint: String,
}

/// Outbound message delivery for push snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn resolve_target(&self, group_id: &str) -> Result<ChatTarget>;
    async fn send_snapshot(&self, target: &ChatTarget, snapshot: &Snapshot) -> Result<()>;
}

/// Webhook-backed delivery: one webhook URL per group id
#[derive(Clone)]
pub struct WebhookGateway {
    client: Client,
    webhooks: HashMap<String, String>,
}

#[derive(Serialize)]
struct WebhookMessage {
    msg_type: String,
    content: WebhookContent,
}

#[derive(Serialize)]
struct WebhookContent {
    text: String,
}

impl WebhookGateway {
    pub fn new(webhooks: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, webhooks })
    }
}

#[async_trait]
impl ChatGateway for WebhookGateway {
    async fn resolve_target(&self, group_id: &str) -> Result<ChatTarget> {
        match self.webhooks.get(group_id) {
            Some(url) => Ok(ChatTarget {
                group_id: group_id.to_string(),
                endpoint: url.clone(),
            }),
            None => Err(WatchError::TargetNotFound {
                group_id: group_id.to_string(),
            }),
        }
    }

    async fn send_snapshot(&self, target: &ChatTarget, snapshot: &Snapshot) -> Result<()> {
        let message = WebhookMessage {
            msg_type: "text".to_string(),
            content: WebhookContent {
                text: render_snapshot(snapshot),
            },
        };

        let resp = self
            .client
            .post(&target.endpoint)
            .json(&message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!(group = %target.group_id, rows = snapshot.rows.len(), "snapshot delivered");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(WatchError::DeliveryFailed(format!("HTTP {status}: {body}")))
        }
    }
}

/// Render a snapshot as a plain text block
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut lines = Vec::new();
    lines.push(snapshot.title.clone());

    if !snapshot.indices.is_empty() {
        let parts: Vec<String> = snapshot
            .indices
            .iter()
            .map(|index| {
                format!(
                    "{} {} ({}%)",
                    index.label,
                    index.quote.price,
                    signed(index.quote.change_pct)
                )
            })
            .collect();
        lines.push(format!("Indices: {}", parts.join("  ")));
    }

    if snapshot.rows.is_empty() {
        lines.push("No quotes available".to_string());
    } else {
        for row in &snapshot.rows {
            lines.push(format!(
                "{}  {}  {}  {}%  {}",
                row.symbol,
                row.name,
                row.price,
                signed(row.change_pct),
                signed(row.change)
            ));
        }
    }

    lines.push(format!(
        "Updated {}",
        snapshot.generated_at.format("%H:%M:%S")
    ));
    lines.join("\n")
}

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        value.to_string()
    } else {
        format!("+{value}")
    }
}
