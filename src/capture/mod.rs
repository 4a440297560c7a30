//! Captured waveform storage
//!
//! - **Capture**: transition-encoded multi-channel sample store with time-indexed lookup
//! - **SumpFile**: reader/writer for the line-oriented capture file format

mod store;
mod sump_file;

pub use store::{Capture, CaptureHeader, CursorMeasurement, LineEdges, compress};
pub use sump_file::SumpFile;
