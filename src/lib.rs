//! SUMP logic analyzer capture store with SPI and UART protocol decoders
//!
//! This library keeps a captured logic-level waveform in a transition-encoded
//! (run-length) form and decodes serial bus traffic out of it.
//!
//! # Architecture
//!
//! - **Capture**: Transition-compressed 32-channel sample store with time-indexed lookup
//! - **SumpFile**: Line-oriented capture file reader/writer (compressed and legacy formats)
//! - **Decoders**: SPI and UART decoders plus the histogram baud-rate estimator
//! - **Scheduler**: Runs decoders on worker threads with cancellation and progress
//! - **Report**: Table model with CSV and HTML exports
//!
//! # Example
//!
//! ```no_run
//! use sump::{Decoder, DecodeContext, ProtocolDecoder, SpiConfig, SpiDecoder, SumpFile};
//!
//! let capture = SumpFile::open("capture.sla")?;
//! let decoder = Decoder::Spi(SpiDecoder::new(SpiConfig::default()));
//! let decoded = decoder.decode(&capture, &DecodeContext::default())?;
//! println!("{} events", decoded.events.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

pub mod capture;
pub mod decoders;
pub mod report;
pub mod runtime;

// Re-export the waveform store
pub use capture::{Capture, CaptureHeader, CursorMeasurement, SumpFile};

// Re-export decoder data types
pub use decoders::{
    BaudRateAnalyzer, BitOrder, DecodeStats, Decoded, DecodedEvent, Decoder, LineEvent,
    LineEventKind, LineRole, Parity, Protocol, SpiConfig, SpiDecoder, SpiMode, SpiTransfer, StopBits,
    TimingInfo, UartConfig, UartDecoder, UartSymbol,
};

// Re-export runtime components
pub use runtime::{
    CancelToken, DecodeContext, DecodeError, DecodeResult, ProgressReporter, ProtocolDecoder,
    Sample, Scheduler,
};

#[derive(Error, Debug)]
pub enum SumpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header parsing error: {0}")]
    ParseHeader(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid data at line {line}: {reason}")]
    InvalidData { line: usize, reason: String },

    #[error("Invalid capture: {0}")]
    InvalidCapture(String),

    #[error("Capture contains no samples")]
    EmptyCapture,
}

pub type Result<T> = std::result::Result<T, SumpError>;
