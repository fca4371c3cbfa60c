//! Per-GPU sample history.
//!
//! Holds a bounded rolling window of readings per GPU: append at the
//! tail, evict aged samples from the front, hand out copy-on-read
//! snapshots to consumers. Every sequence stays ascending by timestamp;
//! the engine guarantees that by stamping each fetch batch with a single
//! `now` and serializing fetches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::source::GpuReading;

/// One timestamped observation for one GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuSample {
    pub timestamp: DateTime<Utc>,
    pub gpu_index: u32,
    pub memory_used_mib: u64,
    pub memory_total_mib: u64,
    pub utilization_percent: u16,
}

impl GpuSample {
    pub fn from_reading(reading: &GpuReading, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            gpu_index: reading.index,
            memory_used_mib: reading.memory_used_mib,
            memory_total_mib: reading.memory_total_mib,
            utilization_percent: reading.utilization_percent,
        }
    }

    /// Memory usage as a rounded percentage; 0 when the total is unknown.
    pub fn usage_percent(&self) -> u16 {
        if self.memory_total_mib == 0 {
            return 0;
        }
        ((self.memory_used_mib as f64 / self.memory_total_mib as f64) * 100.0).round() as u16
    }
}

/// Ascending sample sequences keyed by GPU index.
///
/// Keys appear lazily on the first reading for a GPU and are never
/// removed: a GPU that stops reporting keeps its history frozen.
#[derive(Debug, Default)]
pub struct HistoryStore {
    histories: BTreeMap<u32, Vec<GpuSample>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail of the sample's GPU sequence.
    ///
    /// The caller must not move timestamps backwards; a violation is a
    /// programming error in the single-writer engine, not a runtime
    /// condition.
    pub fn append(&mut self, sample: GpuSample) {
        let history = self.histories.entry(sample.gpu_index).or_default();
        debug_assert!(
            history.last().map_or(true, |last| last.timestamp <= sample.timestamp),
            "samples for GPU {} appended out of order",
            sample.gpu_index
        );
        history.push(sample);
    }

    /// Drop the prefix of samples older than `cutoff` for one GPU.
    pub fn evict_before(&mut self, gpu_index: u32, cutoff: DateTime<Utc>) {
        if let Some(history) = self.histories.get_mut(&gpu_index) {
            let keep_from = history.partition_point(|sample| sample.timestamp < cutoff);
            history.drain(..keep_from);
        }
    }

    /// Copy of one GPU's full sequence; empty if the GPU was never seen.
    pub fn snapshot(&self, gpu_index: u32) -> Vec<GpuSample> {
        self.histories.get(&gpu_index).cloned().unwrap_or_default()
    }

    /// Copy of one GPU's samples at or after `cutoff`.
    pub fn snapshot_since(&self, gpu_index: u32, cutoff: DateTime<Utc>) -> Vec<GpuSample> {
        match self.histories.get(&gpu_index) {
            Some(history) => {
                let from = history.partition_point(|sample| sample.timestamp < cutoff);
                history[from..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Every GPU index ever seen, ascending. Deterministic iteration
    /// order matters to consumers that assign display colors by index.
    pub fn resource_ids(&self) -> Vec<u32> {
        self.histories.keys().copied().collect()
    }

    pub fn len(&self, gpu_index: u32) -> usize {
        self.histories.get(&gpu_index).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn sample(gpu: u32, offset_secs: i64, used: u64) -> GpuSample {
        let base = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        GpuSample {
            timestamp: base + Duration::seconds(offset_secs),
            gpu_index: gpu,
            memory_used_mib: used,
            memory_total_mib: 8192,
            utilization_percent: 50,
        }
    }

    #[test]
    fn append_then_snapshot_round_trips() {
        let mut store = HistoryStore::new();
        store.append(sample(0, 0, 100));
        store.append(sample(0, 5, 200));
        let snap = store.snapshot(0);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[1].memory_used_mib, 200);
        assert_eq!(store.snapshot(1), vec![]);
    }

    #[test]
    fn eviction_drops_exactly_the_stale_prefix() {
        let mut store = HistoryStore::new();
        for i in 0..10 {
            store.append(sample(0, i * 5, i as u64));
        }
        let cutoff = sample(0, 25, 0).timestamp;
        store.evict_before(0, cutoff);

        let snap = store.snapshot(0);
        assert!(snap.iter().all(|s| s.timestamp >= cutoff));
        // Samples at or after the cutoff all survive, in order.
        assert_eq!(
            snap.iter().map(|s| s.memory_used_mib).collect::<Vec<_>>(),
            vec![5, 6, 7, 8, 9]
        );
    }

    #[test]
    fn eviction_of_unknown_gpu_is_a_no_op() {
        let mut store = HistoryStore::new();
        store.append(sample(0, 0, 1));
        store.evict_before(7, Utc::now());
        assert_eq!(store.len(0), 1);
    }

    #[test]
    fn resource_ids_are_ascending_and_sticky() {
        let mut store = HistoryStore::new();
        store.append(sample(3, 0, 1));
        store.append(sample(0, 0, 1));
        store.append(sample(1, 0, 1));
        assert_eq!(store.resource_ids(), vec![0, 1, 3]);

        // Evicting everything does not forget the key.
        store.evict_before(3, sample(0, 100, 0).timestamp);
        assert_eq!(store.resource_ids(), vec![0, 1, 3]);
        assert_eq!(store.snapshot(3), vec![]);
    }

    #[test]
    fn snapshot_since_filters_by_cutoff() {
        let mut store = HistoryStore::new();
        for i in 0..6 {
            store.append(sample(0, i * 10, i as u64));
        }
        let cutoff = sample(0, 30, 0).timestamp;
        let windowed = store.snapshot_since(0, cutoff);
        assert_eq!(
            windowed.iter().map(|s| s.memory_used_mib).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn usage_percent_rounds_and_handles_zero_total() {
        let mut s = sample(0, 0, 1024);
        s.memory_total_mib = 4096;
        assert_eq!(s.usage_percent(), 25);

        s.memory_used_mib = 1000;
        s.memory_total_mib = 3000;
        assert_eq!(s.usage_percent(), 33);

        s.memory_total_mib = 0;
        assert_eq!(s.usage_percent(), 0);
    }

    #[test]
    fn ties_in_timestamp_are_tolerated() {
        let mut store = HistoryStore::new();
        store.append(sample(0, 0, 1));
        store.append(sample(0, 0, 2));
        assert_eq!(store.len(0), 2);
    }
}
