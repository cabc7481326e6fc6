// tests/collect_run.rs
// The collection run end to end against mock collaborators.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use viewtrack::chart::SvgChartRenderer;
use viewtrack::collect::Collector;
use viewtrack::config::AppConfig;
use viewtrack::notify::{ImageBlob, Notifier};
use viewtrack::source::{MetricSource, VideoStat};

fn video(id: &str, views: u64) -> VideoStat {
    VideoStat {
        id: id.to_string(),
        title: format!("video {id}"),
        duration_secs: 60,
        view_count: views,
    }
}

/// Canned per-channel responses, consumed one batch per call; channels
/// in `failing` always error.
struct MockSource {
    batches: Mutex<HashMap<String, Vec<Vec<VideoStat>>>>,
    failing: Vec<String>,
}

impl MockSource {
    fn new() -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            failing: Vec::new(),
        }
    }

    fn with_batches(self, channel_id: &str, batches: Vec<Vec<VideoStat>>) -> Self {
        self.batches
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), batches);
        self
    }

    fn with_failing(mut self, channel_id: &str) -> Self {
        self.failing.push(channel_id.to_string());
        self
    }
}

#[async_trait]
impl MetricSource for MockSource {
    async fn list_videos(&self, channel_id: &str) -> Result<Vec<VideoStat>> {
        if self.failing.iter().any(|c| c == channel_id) {
            return Err(anyhow!("simulated fetch timeout"));
        }
        let mut batches = self.batches.lock().unwrap();
        let queue = batches
            .get_mut(channel_id)
            .ok_or_else(|| anyhow!("no canned data for {channel_id}"))?;
        if queue.is_empty() {
            return Ok(Vec::new());
        }
        Ok(queue.remove(0))
    }

    fn name(&self) -> &'static str {
        "MockSource"
    }
}

/// Records every delivery.
#[derive(Default)]
struct MockNotifier {
    sent: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, text: &str, images: &[ImageBlob]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), images.len()));
        Ok(())
    }
}

fn config(channels: &[(&str, &str)]) -> AppConfig {
    let toml = channels
        .iter()
        .map(|(id, name)| format!("[[channels]]\nid = \"{id}\"\nname = \"{name}\"\n"))
        .collect::<Vec<_>>()
        .join("\n");
    toml::from_str(&toml).unwrap()
}

fn local_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("history.json")
}

fn hour(h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, h, 15, 0).unwrap()
}

#[tokio::test]
async fn one_failing_channel_does_not_abort_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut source = MockSource::new().with_failing("bad");
    for id in ["a", "b", "c", "d"] {
        source = source.with_batches(id, vec![vec![video("v", 100)]]);
    }
    let cfg = config(&[
        ("a", "A"),
        ("b", "B"),
        ("bad", "Broken"),
        ("c", "C"),
        ("d", "D"),
    ]);
    let collector = Collector::new(cfg, Box::new(source)).with_local_path(local_path(&tmp));

    let report = collector.run_at(hour(10)).await.unwrap();

    // The failing channel is skipped; the other four are all there.
    assert_eq!(report.channels.len(), 4);
    assert!(report.channels.iter().all(|c| c.name != "Broken"));

    // And their snapshots were appended and persisted.
    let blob = std::fs::read(local_path(&tmp)).unwrap();
    let store: viewtrack::SnapshotStore = serde_json::from_slice(&blob).unwrap();
    assert_eq!(store.channel_count(), 4);
    assert_eq!(store.channel_history("a").len(), 1);
    assert!(store.channel_history("bad").is_empty());
}

#[tokio::test]
async fn second_run_produces_deltas_and_surges() {
    let tmp = tempfile::tempdir().unwrap();
    let source = MockSource::new().with_batches(
        "ch",
        vec![
            vec![video("hot", 100), video("steady", 1000)],
            vec![video("hot", 160), video("steady", 1100)],
        ],
    );
    let collector =
        Collector::new(config(&[("ch", "Channel")]), Box::new(source)).with_local_path(local_path(&tmp));

    let first = collector.run_at(hour(10)).await.unwrap();
    assert!(first.channels[0].short_delta.is_absent());
    assert!(first.surges.is_empty());

    let second = collector.run_at(hour(11)).await.unwrap();
    let ch = &second.channels[0];
    // 1260 - 1100 across the two snapshots.
    assert_eq!(ch.short_delta.value, Some(160));
    assert_eq!(second.total_short, 160);
    // 48-sample window still warming up.
    assert!(ch.long_delta.is_absent());
    assert_eq!(second.total_long, 0);

    // Only the +60% video surges; +10% does not.
    assert_eq!(second.surges.len(), 1);
    let surge = &second.surges[0];
    assert_eq!(surge.video_id, "hot");
    assert_eq!(surge.change, 60);
    assert_eq!(surge.change_percent, 60.0);
    assert_eq!(surge.channel_name, "Channel");
}

#[tokio::test]
async fn same_hour_rerun_overwrites_the_bucket() {
    let tmp = tempfile::tempdir().unwrap();
    let source = MockSource::new().with_batches(
        "ch",
        vec![vec![video("v", 100)], vec![video("v", 130)]],
    );
    let collector =
        Collector::new(config(&[("ch", "C")]), Box::new(source)).with_local_path(local_path(&tmp));

    collector.run_at(hour(10)).await.unwrap();
    // Same hour, fresh numbers: replaces, so the delta stays absent.
    let report = collector.run_at(hour(10)).await.unwrap();
    assert!(report.channels[0].short_delta.is_absent());

    let blob = std::fs::read(local_path(&tmp)).unwrap();
    let store: viewtrack::SnapshotStore = serde_json::from_slice(&blob).unwrap();
    let hist = store.channel_history("ch");
    assert_eq!(hist.len(), 1);
    assert_eq!(hist[0].1.total_views, 130);
}

#[tokio::test]
async fn duration_ceiling_and_top_k_bound_tracking() {
    let tmp = tempfile::tempdir().unwrap();
    let mut long_video = video("feature-film", 9999);
    long_video.duration_secs = 120;

    let source = MockSource::new().with_batches(
        "ch",
        vec![vec![
            video("v1", 10),
            video("v2", 20),
            video("v3", 30),
            long_video,
        ]],
    );
    let mut cfg = config(&[("ch", "C")]);
    cfg.top_videos = 2;
    let collector = Collector::new(cfg, Box::new(source)).with_local_path(local_path(&tmp));

    let report = collector.run_at(hour(10)).await.unwrap();

    // The 120s video is not a Short: out of the count and the totals.
    assert_eq!(report.channels[0].shorts_count, 3);
    let blob = std::fs::read(local_path(&tmp)).unwrap();
    let store: viewtrack::SnapshotStore = serde_json::from_slice(&blob).unwrap();
    assert_eq!(store.channel_history("ch")[0].1.total_views, 60);
    // Only the top-K (here 2) videos get a tracked series.
    assert_eq!(store.video_series_count(), 2);
    assert_eq!(store.video_history("ch", "v1").len(), 1);
    assert!(store.video_history("ch", "v3").is_empty());
}

#[tokio::test]
async fn videos_dropped_from_the_feed_lose_their_series() {
    let tmp = tempfile::tempdir().unwrap();
    let source = MockSource::new().with_batches(
        "ch",
        vec![
            vec![video("old", 50), video("kept", 10)],
            vec![video("kept", 12), video("new", 5)],
        ],
    );
    let collector =
        Collector::new(config(&[("ch", "C")]), Box::new(source)).with_local_path(local_path(&tmp));

    collector.run_at(hour(10)).await.unwrap();
    collector.run_at(hour(11)).await.unwrap();

    let blob = std::fs::read(local_path(&tmp)).unwrap();
    let store: viewtrack::SnapshotStore = serde_json::from_slice(&blob).unwrap();
    assert!(store.video_history("ch", "old").is_empty());
    assert_eq!(store.video_history("ch", "kept").len(), 2);
    assert_eq!(store.video_history("ch", "new").len(), 1);
}

#[tokio::test]
async fn run_and_notify_delivers_text_and_chart() {
    let tmp = tempfile::tempdir().unwrap();
    let source = MockSource::new().with_batches(
        "ch",
        vec![vec![video("v", 100)], vec![video("v", 200)]],
    );
    let notifier: &'static MockNotifier = Box::leak(Box::new(MockNotifier::default()));
    let collector = Collector::new(config(&[("ch", "C")]), Box::new(source))
        .with_local_path(local_path(&tmp))
        .with_renderer(Box::new(SvgChartRenderer::default()))
        .with_notifier(Box::new(RefNotifier(notifier)));

    collector.run_and_notify().await.unwrap();
    collector.run_and_notify().await.unwrap();

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].0.contains("Channels"));
    // Second run has a positive short delta only when the runs landed in
    // different hour buckets; either way the message always goes out.
    assert!(sent[1].0.contains("60min"));
}

/// Wrapper so the test can keep reading the recorder after handing the
/// collector its boxed notifier.
struct RefNotifier(&'static MockNotifier);

#[async_trait]
impl Notifier for RefNotifier {
    async fn send(&self, text: &str, images: &[ImageBlob]) -> Result<()> {
        self.0.send(text, images).await
    }
}
