//! # Collection Run
//! One pass over every tracked channel: fetch fresh video stats, append
//! a snapshot, derive window deltas and surge events, aggregate, then
//! persist and (optionally) notify.
//!
//! A fetch failure skips that channel for the run and nothing else; the
//! store is the single cross-channel synchronization point and is
//! persisted exactly once, after the loop.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::chart::{short_window_series, ChartRenderer};
use crate::config::AppConfig;
use crate::history::{timestamp_key, ChannelSample};
use crate::notify::{notify_best_effort, ImageBlob, Notifier};
use crate::persist;
use crate::report::{aggregate, format_message, ChannelReport, CollectionReport};
use crate::source::MetricSource;
use crate::surge;
use crate::window::delta_by_sample_count;

/// One-time metrics registration (so series show up on a recorder).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_runs_total", "Completed collection runs.");
        describe_counter!(
            "collect_fetch_errors_total",
            "Channels skipped due to fetch errors."
        );
        describe_counter!("collect_surges_total", "Surge events detected.");
        describe_counter!("collect_videos_total", "Video rows tracked per run.");
        describe_counter!("source_page_errors_total", "Source pagination failures.");
        describe_counter!("source_videos_total", "Video rows fetched from the source.");
        describe_histogram!("source_fetch_ms", "Per-channel source fetch time in ms.");
        describe_gauge!("collect_last_run_ts", "Unix ts of the last completed run.");
    });
}

/// The orchestrator: owns the configuration and the collaborators.
pub struct Collector {
    config: AppConfig,
    source: Box<dyn MetricSource>,
    notifier: Option<Box<dyn Notifier>>,
    backup: Option<Box<dyn crate::backup::RemoteBackup>>,
    renderer: Option<Box<dyn ChartRenderer>>,
    local_path: PathBuf,
}

impl Collector {
    pub fn new(config: AppConfig, source: Box<dyn MetricSource>) -> Self {
        Self {
            config,
            source,
            notifier: None,
            backup: None,
            renderer: None,
            local_path: PathBuf::from(persist::DEFAULT_LOCAL_PATH),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_backup(mut self, backup: Box<dyn crate::backup::RemoteBackup>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ChartRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_local_path(mut self, path: PathBuf) -> Self {
        self.local_path = path;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one collection pass and return the aggregated report.
    pub async fn run_once(&self) -> Result<CollectionReport> {
        self.run_at(Utc::now()).await
    }

    /// Like [`run_once`](Self::run_once) with an explicit run timestamp;
    /// the hour bucket of `now` is the snapshot key.
    pub async fn run_at(&self, now: chrono::DateTime<Utc>) -> Result<CollectionReport> {
        ensure_metrics_described();

        let backup = self.backup.as_deref();
        let mut loaded = persist::load_history(backup, &self.local_path).await;
        let store = &mut loaded.store;

        let ts_key = timestamp_key(&now);
        let cfg = &self.config;

        let mut channels: Vec<ChannelReport> = Vec::with_capacity(cfg.channels.len());
        let mut surges: Vec<surge::SurgeEvent> = Vec::new();

        for ch in &cfg.channels {
            let videos = match self.source.list_videos(&ch.id).await {
                Ok(v) => v,
                Err(e) => {
                    // Skip-and-continue: this channel simply gains no
                    // snapshot this cycle, which the window resolver
                    // already tolerates.
                    tracing::warn!(channel = %ch.name, error = ?e, "fetch failed; channel skipped this run");
                    counter!("collect_fetch_errors_total").increment(1);
                    continue;
                }
            };

            let shorts: Vec<_> = videos
                .into_iter()
                .filter(|v| v.duration_secs <= cfg.max_duration_secs)
                .collect();
            let total_views: u64 = shorts.iter().map(|v| v.view_count).sum();
            tracing::info!(
                channel = %ch.name,
                shorts = shorts.len(),
                total_views,
                "channel collected"
            );

            store.append(
                &ch.id,
                &ts_key,
                ChannelSample {
                    total_views,
                    shorts_count: shorts.len(),
                },
            );

            let tracked = &shorts[..cfg.top_videos.min(shorts.len())];
            for video in tracked {
                store.append_video(&ch.id, &video.id, &ts_key, video.view_count);
            }
            counter!("collect_videos_total").increment(tracked.len() as u64);

            let totals: Vec<u64> = store
                .channel_history(&ch.id)
                .iter()
                .map(|(_, s)| s.total_views)
                .collect();
            let short_delta = delta_by_sample_count(&totals, cfg.short_window_samples);
            let long_delta = delta_by_sample_count(&totals, cfg.long_window_samples);

            for video in tracked {
                let series = store.video_history(&ch.id, &video.id);
                if series.len() < 2 {
                    continue;
                }
                let previous_views = series[1].1;
                if let Some(event) = surge::detect(
                    &ch.name,
                    &video.id,
                    &video.title,
                    previous_views,
                    video.view_count,
                    cfg.surge_threshold_percent,
                ) {
                    surges.push(event);
                }
            }

            let live: HashSet<String> = tracked.iter().map(|v| v.id.clone()).collect();
            store.retain_videos(&ch.id, &live);

            channels.push(ChannelReport {
                id: ch.id.clone(),
                name: ch.name.clone(),
                shorts_count: shorts.len(),
                short_delta,
                long_delta,
                recent_video: shorts.first().cloned(),
            });
        }

        store.prune_depth(cfg.retain_samples());

        if let Err(e) = persist::persist_history(
            store,
            backup,
            loaded.remote_version.as_deref(),
            &self.local_path,
        )
        .await
        {
            tracing::warn!(error = ?e, "history persist failed; continuing with in-memory state");
        }

        let report = aggregate(now, channels, surges, cfg.surge_display_limit);

        counter!("collect_runs_total").increment(1);
        counter!("collect_surges_total").increment(report.surges.len() as u64);
        gauge!("collect_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            channels = report.channels.len(),
            surges = report.surges.len(),
            total_short = report.total_short,
            total_long = report.total_long,
            "collection run complete"
        );

        Ok(report)
    }

    /// Run one pass and deliver the formatted report through the
    /// configured notifier (best-effort), charts attached when a
    /// renderer is wired.
    pub async fn run_and_notify(&self) -> Result<CollectionReport> {
        let report = self.run_once().await?;
        let Some(notifier) = &self.notifier else {
            tracing::debug!("no notifier configured; report not delivered");
            return Ok(report);
        };

        let text = format_message(&report);
        let images = self.render_charts(&report);
        notify_best_effort(notifier.as_ref(), &text, &images).await;
        Ok(report)
    }

    fn render_charts(&self, report: &CollectionReport) -> Vec<ImageBlob> {
        let Some(renderer) = &self.renderer else {
            return Vec::new();
        };
        let series = short_window_series(report);
        if series.is_empty() {
            return Vec::new();
        }
        match renderer.render("60min gains", &series) {
            Ok(bytes) => vec![ImageBlob {
                name: format!("chart_60min.{}", renderer.extension()),
                bytes,
            }],
            Err(e) => {
                tracing::warn!(error = ?e, "chart render failed; sending text only");
                Vec::new()
            }
        }
    }
}
