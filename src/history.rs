//! # Snapshot History
//! Append-only, per-channel store of hourly view-count snapshots, plus
//! per-video series under composite `{channel_id}_{video_id}` keys.
//!
//! Timestamp keys are zero-padded `YYYY-MM-DD_HH:00` strings, so the
//! lexicographic order of the keys IS chronological order. Every window
//! computation downstream depends on that invariant.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hour-bucket key format. Must sort lexicographically in time order.
pub const TIMESTAMP_KEY_FORMAT: &str = "%Y-%m-%d_%H:00";

/// Render the hour bucket a collection run falls into.
pub fn timestamp_key(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_KEY_FORMAT).to_string()
}

/// One channel-level observation: the summed view count of all tracked
/// Shorts and how many there were.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSample {
    pub total_views: u64,
    pub shorts_count: usize,
}

/// The whole persisted history for all channels.
///
/// In memory the channel series and the per-video series live in separate
/// maps; on disk everything flattens into ONE string-keyed JSON object
/// (the wire contract): channel ids map to `{ts: {total_views, ...}}`,
/// composite video keys map to `{ts: view_count}`. The two entry kinds
/// are told apart by value shape on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStore {
    channels: BTreeMap<String, BTreeMap<String, ChannelSample>>,
    videos: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Flat on-disk value. Channel samples are objects, video samples are
/// bare integers, so an untagged enum disambiguates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum HistoryEntry {
    Channel(BTreeMap<String, ChannelSample>),
    Video(BTreeMap<String, u64>),
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite key for a per-video series.
    pub fn video_key(channel_id: &str, video_id: &str) -> String {
        format!("{channel_id}_{video_id}")
    }

    /// Insert or overwrite the channel sample at `ts_key`.
    /// A repeat run within the same hour bucket replaces, not appends.
    pub fn append(&mut self, channel_id: &str, ts_key: &str, sample: ChannelSample) {
        self.channels
            .entry(channel_id.to_string())
            .or_default()
            .insert(ts_key.to_string(), sample);
    }

    /// Insert or overwrite one video's view count at `ts_key`.
    pub fn append_video(&mut self, channel_id: &str, video_id: &str, ts_key: &str, views: u64) {
        self.videos
            .entry(Self::video_key(channel_id, video_id))
            .or_default()
            .insert(ts_key.to_string(), views);
    }

    /// Channel samples, most-recent first. Empty if never observed.
    pub fn channel_history(&self, channel_id: &str) -> Vec<(&str, &ChannelSample)> {
        self.channels
            .get(channel_id)
            .map(|m| m.iter().rev().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }

    /// One video's samples, most-recent first. Empty if never observed.
    pub fn video_history(&self, channel_id: &str, video_id: &str) -> Vec<(&str, u64)> {
        self.videos
            .get(&Self::video_key(channel_id, video_id))
            .map(|m| m.iter().rev().map(|(k, v)| (k.as_str(), *v)).collect())
            .unwrap_or_default()
    }

    /// Drop per-video series of `channel_id` whose video id is not in
    /// `live`. Videos outside the tracked top-K are invisible to surge
    /// detection, so their history only grows the blob.
    pub fn retain_videos(&mut self, channel_id: &str, live: &HashSet<String>) {
        let prefix = format!("{channel_id}_");
        self.videos.retain(|key, _| match key.strip_prefix(&prefix) {
            Some(video_id) => live.contains(video_id),
            None => true,
        });
    }

    /// Keep only the newest `retain_samples` buckets of every series.
    /// Bounds blob growth; anything older than the longest configured
    /// window can never be read again.
    pub fn prune_depth(&mut self, retain_samples: usize) {
        fn trim<V>(m: &mut BTreeMap<String, V>, keep: usize) {
            while m.len() > keep {
                let oldest = match m.keys().next() {
                    Some(k) => k.clone(),
                    None => break,
                };
                m.remove(&oldest);
            }
        }
        for series in self.channels.values_mut() {
            trim(series, retain_samples);
        }
        for series in self.videos.values_mut() {
            trim(series, retain_samples);
        }
    }

    /// Number of channel series tracked.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of per-video series tracked.
    pub fn video_series_count(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.videos.is_empty()
    }

    fn to_flat(&self) -> BTreeMap<String, HistoryEntry> {
        let mut flat = BTreeMap::new();
        for (id, series) in &self.channels {
            if !series.is_empty() {
                flat.insert(id.clone(), HistoryEntry::Channel(series.clone()));
            }
        }
        for (key, series) in &self.videos {
            if !series.is_empty() {
                flat.insert(key.clone(), HistoryEntry::Video(series.clone()));
            }
        }
        flat
    }

    fn from_flat(flat: BTreeMap<String, HistoryEntry>) -> Self {
        let mut store = Self::default();
        for (key, entry) in flat {
            match entry {
                HistoryEntry::Channel(series) => {
                    store.channels.insert(key, series);
                }
                HistoryEntry::Video(series) => {
                    store.videos.insert(key, series);
                }
            }
        }
        store
    }
}

impl Serialize for SnapshotStore {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_flat().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SnapshotStore {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, HistoryEntry>::deserialize(deserializer).map(Self::from_flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(total: u64, count: usize) -> ChannelSample {
        ChannelSample {
            total_views: total,
            shorts_count: count,
        }
    }

    #[test]
    fn timestamp_key_is_hour_bucket() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 9, 42, 31).unwrap();
        assert_eq!(timestamp_key(&at), "2026-03-07_09:00");
    }

    #[test]
    fn history_is_most_recent_first_across_date_boundaries() {
        let mut store = SnapshotStore::new();
        // Inserted out of order on purpose; the map orders by key.
        store.append("ch", "2025-10-01_00:00", sample(30, 3));
        store.append("ch", "2025-09-30_23:00", sample(20, 3));
        store.append("ch", "2025-09-30_09:00", sample(10, 3));

        let hist = store.channel_history("ch");
        let keys: Vec<&str> = hist.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["2025-10-01_00:00", "2025-09-30_23:00", "2025-09-30_09:00"]
        );
        assert_eq!(hist[0].1.total_views, 30);
    }

    #[test]
    fn same_bucket_overwrites_instead_of_appending() {
        let mut store = SnapshotStore::new();
        store.append("ch", "2026-01-01_10:00", sample(100, 5));
        store.append("ch", "2026-01-01_10:00", sample(120, 6));

        let hist = store.channel_history("ch");
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].1.total_views, 120);
        assert_eq!(hist[0].1.shorts_count, 6);
    }

    #[test]
    fn unknown_channel_yields_empty_history() {
        let store = SnapshotStore::new();
        assert!(store.channel_history("nope").is_empty());
        assert!(store.video_history("nope", "v").is_empty());
    }

    #[test]
    fn flat_layout_round_trips() {
        let mut store = SnapshotStore::new();
        store.append("UCabc", "2026-01-01_10:00", sample(1000, 12));
        store.append("UCabc", "2026-01-01_11:00", sample(1100, 12));
        store.append_video("UCabc", "vid1", "2026-01-01_10:00", 400);
        store.append_video("UCabc", "vid1", "2026-01-01_11:00", 460);
        store.append_video("UCabc", "vid2", "2026-01-01_11:00", 9);

        let blob = serde_json::to_vec(&store).unwrap();
        let back: SnapshotStore = serde_json::from_slice(&blob).unwrap();
        assert_eq!(back, store);

        // The wire shape is the flat contract: composite keys at top level.
        let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        assert_eq!(value["UCabc"]["2026-01-01_10:00"]["total_views"], 1000);
        assert_eq!(value["UCabc_vid1"]["2026-01-01_11:00"], 460);
    }

    #[test]
    fn retain_videos_drops_untracked_series_of_that_channel_only() {
        let mut store = SnapshotStore::new();
        store.append_video("chA", "keep", "2026-01-01_10:00", 1);
        store.append_video("chA", "drop", "2026-01-01_10:00", 2);
        store.append_video("chB", "other", "2026-01-01_10:00", 3);

        let live: HashSet<String> = ["keep".to_string()].into_iter().collect();
        store.retain_videos("chA", &live);

        assert_eq!(store.video_history("chA", "keep").len(), 1);
        assert!(store.video_history("chA", "drop").is_empty());
        assert_eq!(store.video_history("chB", "other").len(), 1);
    }

    #[test]
    fn prune_depth_keeps_newest_buckets() {
        let mut store = SnapshotStore::new();
        for h in 0..10 {
            let key = format!("2026-01-01_{h:02}:00");
            store.append("ch", &key, sample(h as u64, 1));
            store.append_video("ch", "v", &key, h as u64);
        }
        store.prune_depth(3);

        let hist = store.channel_history("ch");
        assert_eq!(hist.len(), 3);
        assert_eq!(hist[0].0, "2026-01-01_09:00");
        assert_eq!(hist[2].0, "2026-01-01_07:00");
        assert_eq!(store.video_history("ch", "v").len(), 3);
    }
}
