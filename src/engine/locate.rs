//! Nearest-timestamp lookup for cursor probing.

use chrono::{DateTime, Utc};

use super::history::GpuSample;

/// Find the sample closest in time to `query`.
///
/// `samples` must be ascending by timestamp. Queries outside the
/// covered range clamp to the first or last sample. On an exact
/// equidistant tie the earlier sample wins; probing consumers rely on
/// that rule being stable. O(log n).
pub fn nearest(samples: &[GpuSample], query: DateTime<Utc>) -> Option<&GpuSample> {
    if samples.is_empty() {
        return None;
    }

    let idx = samples.partition_point(|sample| sample.timestamp < query);
    if idx >= samples.len() {
        return samples.last();
    }
    if samples[idx].timestamp == query {
        return Some(&samples[idx]);
    }
    if idx == 0 {
        return samples.first();
    }

    let before = &samples[idx - 1];
    let after = &samples[idx];
    if query - before.timestamp <= after.timestamp - query {
        Some(before)
    } else {
        Some(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn series(offsets_secs: &[i64]) -> Vec<GpuSample> {
        offsets_secs
            .iter()
            .map(|&offset| GpuSample {
                timestamp: base() + Duration::seconds(offset),
                gpu_index: 0,
                memory_used_mib: offset as u64,
                memory_total_mib: 8192,
                utilization_percent: 0,
            })
            .collect()
    }

    #[test]
    fn empty_sequence_has_no_nearest() {
        assert_eq!(nearest(&[], base()), None);
    }

    #[test]
    fn exact_match_is_returned() {
        let samples = series(&[0, 10, 20]);
        let found = nearest(&samples, base() + Duration::seconds(10)).unwrap();
        assert_eq!(found.timestamp, samples[1].timestamp);
    }

    #[rstest]
    #[case(-100, 0)] // before the range clamps to the first sample
    #[case(999, 20)] // past the range clamps to the last sample
    #[case(12, 10)] // closer to the left neighbor
    #[case(18, 20)] // closer to the right neighbor
    #[case(15, 10)] // equidistant tie goes to the earlier sample
    fn picks_the_closest_sample(#[case] query_offset: i64, #[case] expected_offset: i64) {
        let samples = series(&[0, 10, 20]);
        let found = nearest(&samples, base() + Duration::seconds(query_offset)).unwrap();
        assert_eq!(found.timestamp, base() + Duration::seconds(expected_offset));
    }

    #[test]
    fn agrees_with_a_linear_scan() {
        let samples = series(&[0, 3, 7, 19, 40, 41, 100]);
        for query_offset in -5..110 {
            let query = base() + Duration::seconds(query_offset);
            let found = nearest(&samples, query).unwrap();

            let oracle = samples
                .iter()
                .min_by_key(|s| {
                    let distance = (s.timestamp - query).num_seconds().abs();
                    // Earlier sample wins ties.
                    (distance, s.timestamp)
                })
                .unwrap();
            assert_eq!(found.timestamp, oracle.timestamp, "query offset {query_offset}");
        }
    }

    #[test]
    fn single_sample_always_wins() {
        let samples = series(&[5]);
        for query_offset in [0, 5, 50] {
            let found = nearest(&samples, base() + Duration::seconds(query_offset)).unwrap();
            assert_eq!(found.timestamp, samples[0].timestamp);
        }
    }
}
