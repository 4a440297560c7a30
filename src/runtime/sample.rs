//! Per-line edge type used by the decoders

use std::fmt;

/// Sample representing one logic line's level starting at a specific sample index
///
/// This is the run-length view of a single line: a new `Sample` exists only where
/// the masked line changes, and the level holds until the next `Sample`.
/// Duration is determined by the next sample (next.start_time - current.start_time).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    /// Line level at this sample index
    pub value: bool,
    /// Absolute sample index where this level started
    pub start_time: u64,
}

impl Sample {
    /// Create a new sample
    pub fn new(value: bool, start_time: u64) -> Self {
        Self { value, start_time }
    }

    /// True when this edge is a low-to-high transition
    pub fn is_rising(&self) -> bool {
        self.value
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sample[v={}, t={}]", self.value, self.start_time)
    }
}
