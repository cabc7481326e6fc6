//! # Collection Report
//! Folds per-channel results into the run-level report object and
//! renders the outbound message body.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::source::VideoStat;
use crate::surge::SurgeEvent;
use crate::window::DeltaResult;

/// How many surging videos the message shows. The report object keeps
/// the full ranked list regardless.
pub const DEFAULT_SURGE_DISPLAY_LIMIT: usize = 5;

const TITLE_DISPLAY_CHARS: usize = 30;

/// Per-channel slice of one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub id: String,
    pub name: String,
    pub shorts_count: usize,
    pub short_delta: DeltaResult,
    pub long_delta: DeltaResult,
    pub recent_video: Option<VideoStat>,
}

/// Everything one collection run produced.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub generated_at: DateTime<Utc>,
    pub channels: Vec<ChannelReport>,
    /// Sum of PRESENT short-window deltas; absent channels contribute 0
    /// but stay individually marked absent below.
    pub total_short: i64,
    pub total_long: i64,
    /// Full surge list, ranked by absolute change descending.
    pub surges: Vec<SurgeEvent>,
    pub surge_display_limit: usize,
}

impl CollectionReport {
    /// The ranked surge list truncated for display.
    pub fn top_surges(&self) -> &[SurgeEvent] {
        let n = self.surge_display_limit.min(self.surges.len());
        &self.surges[..n]
    }
}

/// Fold per-channel deltas and surge events into one report.
///
/// The surge sort is stable: equal changes keep their discovery order.
pub fn aggregate(
    generated_at: DateTime<Utc>,
    channels: Vec<ChannelReport>,
    mut surges: Vec<SurgeEvent>,
    surge_display_limit: usize,
) -> CollectionReport {
    let total_short = channels
        .iter()
        .filter_map(|c| c.short_delta.value)
        .sum::<i64>();
    let total_long = channels
        .iter()
        .filter_map(|c| c.long_delta.value)
        .sum::<i64>();

    surges.sort_by(|a, b| b.change.cmp(&a.change));

    CollectionReport {
        generated_at,
        channels,
        total_short,
        total_long,
        surges,
        surge_display_limit,
    }
}

/// Compact count formatting: `812`, `3.4K`, `1.2M`.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Signed delta formatting: `+3.4K`, `-120`, `+0`.
pub fn format_delta(n: i64) -> String {
    if n < 0 {
        format!("-{}", format_count(n.unsigned_abs()))
    } else {
        format!("+{}", format_count(n as u64))
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_DISPLAY_CHARS {
        let short: String = title.chars().take(TITLE_DISPLAY_CHARS).collect();
        format!("{short}...")
    } else {
        title.to_string()
    }
}

fn delta_line(label: &str, delta: &DeltaResult) -> String {
    match delta.value {
        Some(v) => format!("{label}: {}", format_delta(v)),
        None => format!("{label}: (waiting)"),
    }
}

/// Render the outbound message body: run summary, surging videos, then
/// one block per channel.
pub fn format_message(report: &CollectionReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "Summary ({})",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(String::new());
    lines.push(format!("48h: {}", format_delta(report.total_long)));
    lines.push(format!("60min: {}", format_delta(report.total_short)));

    let top = report.top_surges();
    if !top.is_empty() {
        lines.push(String::new());
        lines.push("Surging videos (60min +50%)".to_string());
        lines.push(String::new());
        for surge in top {
            lines.push(format!("* {}", surge.channel_name));
            lines.push(format!("  \"{}\"", truncate_title(&surge.title)));
            lines.push(format!(
                "  60min: {} (+{:.0}%)",
                format_delta(surge.change),
                surge.change_percent
            ));
            lines.push(format!("  total: {} views", format_count(surge.current_views)));
            lines.push(String::new());
        }
    }

    lines.push("-".repeat(25));
    lines.push(String::new());
    lines.push("Channels".to_string());
    lines.push(String::new());

    for ch in &report.channels {
        lines.push(format!("* {} ({} shorts)", ch.name, ch.shorts_count));
        lines.push(delta_line("60min", &ch.short_delta));
        lines.push(delta_line("48h", &ch.long_delta));
        if let Some(video) = &ch.recent_video {
            lines.push(format!(
                "latest: \"{}\" | {} views",
                truncate_title(&video.title),
                format_count(video.view_count)
            ));
        }
        lines.push(String::new());
    }

    lines.push("-".repeat(25));
    lines.join("\n")
}
