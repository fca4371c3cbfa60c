//! Downsampling for chart rendering.
//!
//! A multi-hour history at a 5-second cadence holds far more samples
//! than a chart has columns. The reducer partitions the input into
//! contiguous buckets and keeps each bucket's peak, so short transient
//! spikes survive compression instead of being averaged away.

use super::history::GpuSample;

/// Point budget for a rendered series.
pub const RENDER_POINT_BUDGET: usize = 200;

/// Reduce `samples` to at most `limit` points.
///
/// Under the limit the input is returned unchanged. Over it, the input
/// is split into `limit` buckets with float boundaries truncated to
/// indices (the last bucket absorbs the remainder), and each non-empty
/// bucket contributes its maximum by `metric`, first occurrence winning
/// ties. Bucket order is preserved, so ascending input stays ascending.
///
/// Callers that draw several charts for one GPU should downsample once
/// and reuse the result, keeping the charts aligned on the x-axis.
pub fn downsample<F>(samples: &[GpuSample], limit: usize, metric: F) -> Vec<GpuSample>
where
    F: Fn(&GpuSample) -> u64,
{
    if samples.len() <= limit {
        return samples.to_vec();
    }
    // A zero limit still yields one representative for non-empty input.
    let limit = limit.max(1);

    let chunk = samples.len() as f64 / limit as f64;
    let mut reduced = Vec::with_capacity(limit);

    for i in 0..limit {
        let start = (i as f64 * chunk) as usize;
        let end = (((i + 1) as f64 * chunk) as usize).min(samples.len());
        if start >= end {
            continue;
        }

        let mut best = start;
        for j in start + 1..end {
            if metric(&samples[j]) > metric(&samples[best]) {
                best = j;
            }
        }
        reduced.push(samples[best]);
    }

    reduced
}
