//! # Surge Detector
//! Classifies a video as "surging" when its view count grew by at least
//! a configured percentage between the two most recent samples.
//!
//! Pure business logic, no I/O. The percentage baseline is the previous
//! sample; a zero baseline never classifies (the growth is undefined,
//! not infinite).

use serde::Serialize;

/// Default growth threshold: +50% over one sampling interval.
pub const DEFAULT_SURGE_THRESHOLD_PERCENT: f64 = 50.0;

/// One surging video, with the numbers that made it qualify.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeEvent {
    pub channel_name: String,
    pub video_id: String,
    pub title: String,
    pub previous_views: u64,
    pub current_views: u64,
    pub change: i64,
    pub change_percent: f64,
}

/// Compare two consecutive samples of one video.
///
/// Returns an event iff the change is positive AND the growth meets the
/// threshold (inclusive: exactly `threshold_percent` qualifies).
pub fn detect(
    channel_name: &str,
    video_id: &str,
    title: &str,
    previous_views: u64,
    current_views: u64,
    threshold_percent: f64,
) -> Option<SurgeEvent> {
    if previous_views == 0 {
        return None;
    }
    let change = current_views as i64 - previous_views as i64;
    if change <= 0 {
        return None;
    }
    let change_percent = (change as f64 / previous_views as f64) * 100.0;
    if change_percent < threshold_percent {
        return None;
    }
    Some(SurgeEvent {
        channel_name: channel_name.to_string(),
        video_id: video_id.to_string(),
        title: title.to_string(),
        previous_views,
        current_views,
        change,
        change_percent,
    })
}
