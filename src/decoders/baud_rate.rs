//! Pulse-width histogram for estimating the bit length of an asynchronous line

use crate::capture::Capture;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy)]
struct Bin {
    count: usize,
    first_seen: usize,
}

/// Histogram of pulse durations on one line.
///
/// The most frequent duration is taken as the length of a single bit: isolated
/// glitches and multi-bit runs are rarer than single-bit pulses in ordinary
/// traffic. Ties go to the duration seen first.
#[derive(Debug, Clone, Default)]
pub struct BaudRateAnalyzer {
    bins: HashMap<u64, Bin>,
    pulses: usize,
}

impl BaudRateAnalyzer {
    /// Measure every pulse of the line selected by `mask`.
    ///
    /// The first pulse is measured from sample 0.
    pub fn new(capture: &Capture, mask: u32) -> Self {
        Self::from_edges(capture.line_edges(mask).map(|edge| edge.start_time))
    }

    /// Build the histogram from ascending edge times
    pub fn from_edges(edges: impl IntoIterator<Item = u64>) -> Self {
        let mut analyzer = Self::default();
        let mut last = 0;
        for time in edges {
            analyzer.record(time - last);
            last = time;
        }
        analyzer
    }

    fn record(&mut self, duration: u64) {
        let first_seen = self.bins.len();
        self.bins
            .entry(duration)
            .or_insert(Bin {
                count: 0,
                first_seen,
            })
            .count += 1;
        self.pulses += 1;
    }

    /// Number of measured pulses
    pub fn pulse_count(&self) -> usize {
        self.pulses
    }

    /// Shortest pulse, 0 without edges
    pub fn min(&self) -> u64 {
        self.bins.keys().copied().min().unwrap_or(0)
    }

    /// Longest pulse, 0 without edges
    pub fn max(&self) -> u64 {
        self.bins.keys().copied().max().unwrap_or(0)
    }

    /// Most frequent pulse duration in samples, 0 without edges
    pub fn best(&self) -> u64 {
        self.bins
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.count
                    .cmp(&b.count)
                    .then_with(|| b.first_seen.cmp(&a.first_seen))
            })
            .map(|(&duration, _)| duration)
            .unwrap_or(0)
    }

    /// `(duration, count)` pairs sorted by duration
    pub fn histogram(&self) -> Vec<(u64, usize)> {
        let mut histogram: Vec<_> = self
            .bins
            .iter()
            .map(|(&duration, bin)| (duration, bin.count))
            .collect();
        histogram.sort_unstable();
        histogram
    }
}

impl fmt::Display for BaudRateAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min={} max={} best={}", self.min(), self.max(), self.best())
    }
}
