//! Transition-encoded capture store
//!
//! A capture keeps one 32-bit channel word per *transition* instead of per raw
//! sample. `values[i]` holds from `timestamps[i]` up to (but excluding)
//! `timestamps[i + 1]`, and the last value extends to `absolute_length`.
//!
//! Invariants enforced by every constructor:
//! - `values.len() == timestamps.len()` and both are non-empty
//! - `timestamps[0] == 0` and timestamps strictly increase afterwards
//! - no two consecutive values are equal
//! - `absolute_length >= timestamps.last()`

use crate::runtime::Sample;
use crate::{Result, SumpError};
use tracing::debug;

/// Acquisition metadata for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    /// Sample rate in Hz, if the acquisition recorded one
    pub sample_rate: Option<u32>,
    /// Absolute sample index of the trigger, if any
    pub trigger_position: Option<u64>,
    /// Number of channels (1-32)
    pub channels: u8,
    /// Bit mask of enabled channels
    pub enabled_channels: u32,
}

impl CaptureHeader {
    pub fn has_timing_data(&self) -> bool {
        self.sample_rate.is_some()
    }

    pub fn has_trigger_data(&self) -> bool {
        self.trigger_position.is_some()
    }

    /// Sample period in seconds (1 / sample_rate)
    pub fn sample_period(&self) -> Option<f64> {
        self.sample_rate
            .filter(|&rate| rate > 0)
            .map(|rate| 1.0 / f64::from(rate))
    }
}

impl Default for CaptureHeader {
    fn default() -> Self {
        Self {
            sample_rate: None,
            trigger_position: None,
            channels: 32,
            enabled_channels: u32::MAX,
        }
    }
}

/// Distance and timing between the two user cursors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorMeasurement {
    /// Cursor A relative to the trigger (or absolute without trigger)
    pub a: i64,
    /// Cursor B relative to the trigger (or absolute without trigger)
    pub b: i64,
    /// B - A in samples
    pub distance: i64,
    /// |B - A| in seconds, when the sample rate is known
    pub duration: Option<f64>,
    /// rate / |B - A| in Hz; undefined when the cursors coincide
    pub frequency: Option<f64>,
}

/// Captured logic data for one acquisition run
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    header: CaptureHeader,
    values: Vec<u32>,
    timestamps: Vec<u64>,
    absolute_length: u64,
    cursor_a: u64,
    cursor_b: u64,
    cursor_enabled: bool,
}

/// Run-length compress raw per-sample words into (values, timestamps).
///
/// The first sample always produces an entry at timestamp 0; after that only
/// changes are kept.
pub fn compress(samples: &[u32]) -> (Vec<u32>, Vec<u64>) {
    let mut values = Vec::new();
    let mut timestamps = Vec::new();
    let mut last = None;

    for (i, &sample) in samples.iter().enumerate() {
        if last != Some(sample) {
            values.push(sample);
            timestamps.push(i as u64);
            last = Some(sample);
        }
    }

    (values, timestamps)
}

impl Capture {
    /// Build a capture from one raw channel word per sample
    pub fn from_samples(header: CaptureHeader, samples: &[u32]) -> Result<Self> {
        if samples.is_empty() {
            return Err(SumpError::EmptyCapture);
        }

        let (values, timestamps) = compress(samples);
        debug!(
            "Compressed {} samples into {} transitions",
            samples.len(),
            values.len()
        );
        Self::from_transitions(header, values, timestamps, samples.len() as u64)
    }

    /// Build a capture from already compressed transition arrays
    pub fn from_transitions(
        header: CaptureHeader,
        values: Vec<u32>,
        timestamps: Vec<u64>,
        absolute_length: u64,
    ) -> Result<Self> {
        if !(1..=32).contains(&header.channels) {
            return Err(SumpError::InvalidCapture(format!(
                "channel count must be 1-32, got {}",
                header.channels
            )));
        }
        if values.is_empty() {
            return Err(SumpError::EmptyCapture);
        }
        if values.len() != timestamps.len() {
            return Err(SumpError::InvalidCapture(format!(
                "{} values but {} timestamps",
                values.len(),
                timestamps.len()
            )));
        }
        if timestamps[0] != 0 {
            return Err(SumpError::InvalidCapture(format!(
                "first timestamp must be 0, got {}",
                timestamps[0]
            )));
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SumpError::InvalidCapture(format!(
                "timestamp {} at index {} does not increase",
                timestamps[i + 1],
                i + 1
            )));
        }
        if let Some(i) = values.windows(2).position(|w| w[1] == w[0]) {
            return Err(SumpError::InvalidCapture(format!(
                "value at index {} repeats its predecessor",
                i + 1
            )));
        }

        let last = timestamps[timestamps.len() - 1];
        if absolute_length < last {
            return Err(SumpError::InvalidCapture(format!(
                "absolute length {} does not cover last transition at {}",
                absolute_length, last
            )));
        }

        Ok(Self {
            header,
            values,
            timestamps,
            absolute_length,
            cursor_a: 0,
            cursor_b: 0,
            cursor_enabled: false,
        })
    }

    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    /// Channel word at each transition
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Sample index of each transition
    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    /// Number of stored transitions (including the initial state)
    pub fn transition_count(&self) -> usize {
        self.values.len()
    }

    /// Total number of raw samples represented
    pub fn absolute_length(&self) -> u64 {
        self.absolute_length
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.header.sample_rate
    }

    pub fn trigger_position(&self) -> Option<u64> {
        self.header.trigger_position
    }

    pub fn channels(&self) -> u8 {
        self.header.channels
    }

    pub fn enabled_channels(&self) -> u32 {
        self.header.enabled_channels
    }

    /// Index of the last transition at or before `time`.
    ///
    /// Times past the end of the capture resolve to the last transition.
    pub fn sample_index_at(&self, time: u64) -> usize {
        self.timestamps
            .partition_point(|&ts| ts <= time)
            .saturating_sub(1)
    }

    /// Channel word in effect at `time`
    pub fn value_at(&self, time: u64) -> u32 {
        self.values[self.sample_index_at(time)]
    }

    /// Level of the line(s) selected by `mask` at `time`
    pub fn level_at(&self, time: u64, mask: u32) -> bool {
        self.value_at(time) & mask != 0
    }

    /// Offset of an absolute sample index from the trigger position.
    ///
    /// Without trigger data this is the absolute index itself.
    pub fn relative_time(&self, position: u64) -> i64 {
        position as i64 - self.header.trigger_position.unwrap_or(0) as i64
    }

    /// Edges of one line over the whole capture (the initial state is not an edge)
    pub fn line_edges(&self, mask: u32) -> LineEdges<'_> {
        LineEdges::new(self, mask, 0)
    }

    /// Edges of one line strictly after `time`
    pub fn line_edges_after(&self, mask: u32, time: u64) -> LineEdges<'_> {
        LineEdges::new(self, mask, self.sample_index_at(time))
    }

    /// Sample index of the first change on any line selected by `mask`
    pub fn first_edge(&self, mask: u32) -> Option<u64> {
        let initial = self.values[0] & mask;
        self.values
            .iter()
            .zip(&self.timestamps)
            .find(|&(&value, _)| value & mask != initial)
            .map(|(_, &ts)| ts)
    }

    /// Expand back into one channel word per raw sample
    pub fn to_samples(&self) -> Vec<u32> {
        let mut samples = Vec::with_capacity(self.absolute_length as usize);
        for (i, &value) in self.values.iter().enumerate() {
            let end = self
                .timestamps
                .get(i + 1)
                .copied()
                .unwrap_or(self.absolute_length);
            let run = (end - self.timestamps[i]) as usize;
            samples.extend(std::iter::repeat_n(value, run));
        }
        samples
    }

    // ── Cursors ──────────────────────────────────────────────────────────

    pub fn cursor_a(&self) -> u64 {
        self.cursor_a
    }

    pub fn cursor_b(&self) -> u64 {
        self.cursor_b
    }

    pub fn cursor_enabled(&self) -> bool {
        self.cursor_enabled
    }

    pub fn set_cursor_enabled(&mut self, enabled: bool) {
        self.cursor_enabled = enabled;
    }

    /// Set cursor A, clamped to `[0, absolute_length - 1]`
    pub fn set_cursor_a(&mut self, position: i64) {
        self.cursor_a = self.clamp_position(position);
    }

    /// Set cursor B, clamped to `[0, absolute_length - 1]`
    pub fn set_cursor_b(&mut self, position: i64) {
        self.cursor_b = self.clamp_position(position);
    }

    fn clamp_position(&self, position: i64) -> u64 {
        let last = self.absolute_length.saturating_sub(1);
        if position < 0 {
            0
        } else {
            (position as u64).min(last)
        }
    }

    /// Ordered `(low, high)` cursor positions when cursors are enabled
    pub fn cursor_span(&self) -> Option<(u64, u64)> {
        self.cursor_enabled.then(|| {
            (
                self.cursor_a.min(self.cursor_b),
                self.cursor_a.max(self.cursor_b),
            )
        })
    }

    pub fn cursor_measurement(&self) -> CursorMeasurement {
        let distance = self.cursor_b as i64 - self.cursor_a as i64;
        let samples = distance.unsigned_abs();
        let rate = self.header.sample_rate.filter(|&rate| rate > 0);

        CursorMeasurement {
            a: self.relative_time(self.cursor_a),
            b: self.relative_time(self.cursor_b),
            distance,
            duration: rate.map(|rate| samples as f64 / f64::from(rate)),
            frequency: rate
                .filter(|_| samples != 0)
                .map(|rate| f64::from(rate) / samples as f64),
        }
    }
}

/// Iterator over the level changes of one masked line
///
/// Yields a [`Sample`] for every transition where the masked bits change;
/// transitions that only touch other channels are skipped.
pub struct LineEdges<'a> {
    capture: &'a Capture,
    mask: u32,
    index: usize,
    level: u32,
}

impl<'a> LineEdges<'a> {
    fn new(capture: &'a Capture, mask: u32, index: usize) -> Self {
        Self {
            capture,
            mask,
            index,
            level: capture.values[index] & mask,
        }
    }
}

impl Iterator for LineEdges<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        loop {
            self.index += 1;
            let value = *self.capture.values.get(self.index)? & self.mask;
            if value != self.level {
                self.level = value;
                return Some(Sample::new(value != 0, self.capture.timestamps[self.index]));
            }
        }
    }
}
