//! # Window Resolver
//! Trailing-window deltas over an ordered snapshot series.
//!
//! Windows are counted in SAMPLES BACK, not wall-clock time: with one
//! sample per hour, `window_samples = 48` reads as "last 48 hours", but
//! a missed collection run silently widens the effective window by one
//! interval. The `_by_sample_count` name keeps that assumption visible
//! at every call site.

use serde::Serialize;

/// Outcome of one window computation for one channel.
///
/// `value: None` means the window is not computable yet (history still
/// warming up) and is NOT the same as a computed zero change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeltaResult {
    pub window_samples: usize,
    pub value: Option<i64>,
}

impl DeltaResult {
    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }
}

/// Compare the most recent total against the one `window_samples`
/// positions back in a most-recent-first series.
///
/// `window_samples = 1` compares the two newest snapshots; with fewer
/// than `window_samples + 1` snapshots stored the result is absent.
pub fn delta_by_sample_count(totals_most_recent_first: &[u64], window_samples: usize) -> DeltaResult {
    if totals_most_recent_first.len() <= window_samples {
        return DeltaResult {
            window_samples,
            value: None,
        };
    }
    let newest = totals_most_recent_first[0] as i64;
    let baseline = totals_most_recent_first[window_samples] as i64;
    DeltaResult {
        window_samples,
        value: Some(newest - baseline),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_is_absent_not_zero() {
        assert!(delta_by_sample_count(&[], 1).is_absent());
        assert!(delta_by_sample_count(&[100], 1).is_absent());
        assert!(delta_by_sample_count(&[100, 90, 80], 3).is_absent());
        // Exactly window + 1 samples is the first computable state.
        assert_eq!(delta_by_sample_count(&[100, 90, 80, 70], 3).value, Some(30));
    }

    #[test]
    fn one_sample_back_compares_two_newest() {
        let totals = [150, 100, 40];
        assert_eq!(delta_by_sample_count(&totals, 1).value, Some(50));
    }

    #[test]
    fn forty_eight_samples_back() {
        // totals[i] = 4800 - 100*i, most-recent first.
        let totals: Vec<u64> = (0..49).map(|i| 4800 - 100 * i as u64).collect();
        let delta = delta_by_sample_count(&totals, 48);
        assert_eq!(delta.value, Some(4800));
        assert_eq!(delta.window_samples, 48);
    }

    #[test]
    fn zero_change_is_present_zero() {
        let delta = delta_by_sample_count(&[100, 100], 1);
        assert_eq!(delta.value, Some(0));
        assert!(!delta.is_absent());
    }

    #[test]
    fn negative_change_is_reported() {
        // View counts can drop when videos are deleted or reclassified.
        assert_eq!(delta_by_sample_count(&[90, 100], 1).value, Some(-10));
    }
}
