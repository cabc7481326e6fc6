// src/source/mod.rs
pub mod youtube;

use anyhow::Result;

/// One video row as returned by a metric source, duration included so
/// the caller can apply the Shorts duration ceiling before use.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoStat {
    pub id: String,
    pub title: String,
    pub duration_secs: u32,
    pub view_count: u64,
}

/// Source of per-channel video statistics. Implementations return the
/// channel's recent videos most-recent first and must surface partial
/// results when a later page fails rather than discarding the fetch.
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync {
    async fn list_videos(&self, channel_id: &str) -> Result<Vec<VideoStat>>;
    fn name(&self) -> &'static str;
}
