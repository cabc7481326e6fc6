//! # Inbox Listener
//! Long-polls the Telegram update feed and triggers a collection run on
//! demand: `/start` answers with usage, anything else kicks off an
//! update. Short sleep between empty polls, back-off sleep on error.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::time;

use crate::collect::Collector;
use crate::notify::{notify_best_effort, Notifier};

const HELP_TEXT: &str = "viewtrack dashboard bot\n\n\
    Commands:\n\
    - /start: this help\n\
    - any other message: run a dashboard update now";

#[derive(Debug, Clone, Copy)]
pub struct ListenerCfg {
    /// Server-side long-poll window for getUpdates.
    pub poll_timeout_secs: u64,
    pub idle_sleep: Duration,
    pub error_backoff: Duration,
}

impl Default for ListenerCfg {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 30,
            idle_sleep: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

// --- getUpdates response models; unknown fields ignored. ---

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<InboxMessage>,
}

#[derive(Debug, Deserialize)]
struct InboxMessage {
    text: Option<String>,
}

async fn get_updates(
    client: &reqwest::Client,
    bot_token: &str,
    offset: Option<i64>,
    poll_timeout_secs: u64,
) -> Result<UpdatesResponse> {
    let mut req = client
        .get(format!("https://api.telegram.org/bot{bot_token}/getUpdates"))
        // Client timeout sits above the server-side long-poll window.
        .timeout(Duration::from_secs(poll_timeout_secs + 5))
        .query(&[("timeout", poll_timeout_secs.to_string())]);
    if let Some(offset) = offset {
        req = req.query(&[("offset", offset.to_string())]);
    }
    let rsp = req
        .send()
        .await
        .context("telegram getUpdates")?
        .error_for_status()
        .context("telegram getUpdates non-2xx")?;
    rsp.json::<UpdatesResponse>()
        .await
        .context("parsing getUpdates response")
}

/// Poll the inbox until the process is stopped. Every received message
/// is acknowledged; collection failures are reported back to the chat
/// and never break the loop.
pub async fn run_listener(
    collector: &Collector,
    notifier: &dyn Notifier,
    bot_token: &str,
    cfg: ListenerCfg,
) -> Result<()> {
    let client = reqwest::Client::new();
    let mut offset: Option<i64> = None;

    tracing::info!("listener started");
    notify_best_effort(
        notifier,
        "viewtrack bot is up. Send any message to trigger an update.",
        &[],
    )
    .await;

    loop {
        match get_updates(&client, bot_token, offset, cfg.poll_timeout_secs).await {
            Ok(updates) if updates.ok => {
                for update in updates.result {
                    offset = Some(update.update_id + 1);
                    let text = update
                        .message
                        .and_then(|m| m.text)
                        .unwrap_or_default();
                    if text.is_empty() {
                        continue;
                    }
                    tracing::info!(%text, "inbox message");

                    if text == "/start" {
                        notify_best_effort(notifier, HELP_TEXT, &[]).await;
                        continue;
                    }

                    notify_best_effort(notifier, "Updating, hold on...", &[]).await;
                    if let Err(e) = collector.run_and_notify().await {
                        tracing::warn!(error = ?e, "triggered run failed");
                        notify_best_effort(notifier, "Update failed, see logs.", &[]).await;
                    }
                }
                time::sleep(cfg.idle_sleep).await;
            }
            Ok(_) => {
                tracing::warn!("getUpdates answered ok=false");
                time::sleep(cfg.error_backoff).await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "listener poll failed");
                time::sleep(cfg.error_backoff).await;
            }
        }
    }
}
