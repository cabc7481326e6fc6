pub mod telegram;

use anyhow::Result;

/// An image attachment for an outbound report.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    /// File name presented to the transport (`chart_60min.svg`).
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Delivers a formatted report externally. Implementations own their
/// transport-level retries; callers decide whether failure matters.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, images: &[ImageBlob]) -> Result<()>;
}

/// Fire-and-forget delivery: a notification failure is logged and
/// swallowed, never allowed past this boundary.
pub async fn notify_best_effort(notifier: &dyn Notifier, text: &str, images: &[ImageBlob]) {
    if let Err(e) = notifier.send(text, images).await {
        tracing::warn!(error = ?e, "notification failed");
    }
}
