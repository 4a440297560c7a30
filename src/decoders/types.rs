//! Common decoder types and enums

use crate::capture::Capture;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Timing information for decoded events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    /// Absolute sample index in the capture
    pub position: u64,
    /// Offset from the trigger in samples (the absolute index without trigger)
    pub offset: i64,
}

impl TimingInfo {
    /// Create new timing information
    pub fn new(position: u64, offset: i64) -> Self {
        Self { position, offset }
    }

    /// Timing of `position` within `capture`
    pub fn at(capture: &Capture, position: u64) -> Self {
        Self::new(position, capture.relative_time(position))
    }
}

/// SPI clock polarity and phase modes
///
/// Only the sampling edge is derived from the mode: modes 0 and 2 sample on
/// the rising SCK edge, modes 1 and 3 on the falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Whether data is sampled on the rising SCK edge
    pub fn samples_on_rising(self) -> bool {
        matches!(self, SpiMode::Mode0 | SpiMode::Mode2)
    }
}

impl FromStr for SpiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(SpiMode::Mode0),
            "1" => Ok(SpiMode::Mode1),
            "2" => Ok(SpiMode::Mode2),
            "3" => Ok(SpiMode::Mode3),
            other => Err(format!("invalid SPI mode '{}' (expected 0-3)", other)),
        }
    }
}

/// Order in which bits are shifted into an SPI word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

impl FromStr for BitOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msb" => Ok(BitOrder::MsbFirst),
            "lsb" => Ok(BitOrder::LsbFirst),
            other => Err(format!("invalid bit order '{}' (expected msb or lsb)", other)),
        }
    }
}

/// UART parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    /// Number of parity bits in a frame
    pub fn bits(self) -> u32 {
        match self {
            Parity::None => 0,
            Parity::Odd | Parity::Even => 1,
        }
    }

    /// Logical parity bit expected after `data`, if parity is enabled
    pub fn expected_bit(self, data: u32) -> Option<bool> {
        let odd_ones = data.count_ones() % 2 == 1;
        match self {
            Parity::None => None,
            Parity::Odd => Some(!odd_ones),
            Parity::Even => Some(odd_ones),
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Parity::None),
            "odd" => Ok(Parity::Odd),
            "even" => Ok(Parity::Even),
            other => Err(format!("invalid parity '{}' (expected none, odd or even)", other)),
        }
    }
}

/// UART stop bit length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// Stop bits counted as whole bit slots when sizing a frame
    pub fn slots(self) -> u32 {
        match self {
            StopBits::One => 1,
            StopBits::OnePointFive | StopBits::Two => 2,
        }
    }

    /// Samples from the last data/parity sample point to the last stop-bit
    /// sample point
    pub fn span(self, bit_length: u64) -> u64 {
        match self {
            StopBits::One => bit_length,
            StopBits::OnePointFive => bit_length + bit_length / 2,
            StopBits::Two => 2 * bit_length,
        }
    }
}

impl FromStr for StopBits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StopBits::One),
            "1.5" => Ok(StopBits::OnePointFive),
            "2" => Ok(StopBits::Two),
            other => Err(format!("invalid stop bits '{}' (expected 1, 1.5 or 2)", other)),
        }
    }
}

/// Role of a logic line in a decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineRole {
    Sck,
    Mosi,
    Miso,
    Cs,
    Rxd,
    Txd,
    Cts,
    Rts,
    Dtr,
    Dsr,
    Dcd,
    Ri,
}

impl LineRole {
    /// Display name of the line
    pub fn name(self) -> &'static str {
        match self {
            LineRole::Sck => "SCK",
            LineRole::Mosi => "MOSI",
            LineRole::Miso => "MISO",
            LineRole::Cs => "CS",
            LineRole::Rxd => "RxD",
            LineRole::Txd => "TxD",
            LineRole::Cts => "CTS",
            LineRole::Rts => "RTS",
            LineRole::Dtr => "DTR",
            LineRole::Dsr => "DSR",
            LineRole::Dcd => "DCD",
            LineRole::Ri => "RI",
        }
    }
}

impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a channel argument: `"unused"` or a channel index
pub fn parse_channel(s: &str) -> Result<Option<u8>, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("unused") {
        return Ok(None);
    }
    s.parse::<u8>()
        .map(Some)
        .map_err(|_| format!("invalid channel '{}' (expected 0-31 or 'unused')", s))
}

/// Highest channel index a configuration may name
pub const MAX_CHANNEL: u8 = 31;

pub(crate) fn clamp_channel(role: LineRole, channel: u8) -> u8 {
    if channel > MAX_CHANNEL {
        warn!("{} channel {} out of range, using {}", role, channel, MAX_CHANNEL);
        MAX_CHANNEL
    } else {
        channel
    }
}

/// Bit mask of `channel`, clamped to the channels present in `capture`
pub(crate) fn channel_mask(capture: &Capture, role: LineRole, channel: u8) -> u32 {
    let last = capture.channels().saturating_sub(1);
    let channel = if channel > last {
        warn!(
            "{} channel {} beyond capture width ({} channels), using {}",
            role,
            channel,
            capture.channels(),
            last
        );
        last
    } else {
        channel
    };
    1 << channel
}

/// Decoded SPI transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiTransfer {
    /// Data on MOSI line
    pub mosi: u32,
    /// Data on MISO line
    pub miso: u32,
    /// Timing of the last sampling edge of the word
    pub timing: TimingInfo,
}

/// One character decoded from a UART data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartSymbol {
    pub line: LineRole,
    pub value: u32,
    /// Timing of the last stop-bit sample point
    pub timing: TimingInfo,
}

/// Kind of a non-data line event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEventKind {
    /// Chip select went low
    CsLow,
    /// Chip select went high
    CsHigh,
    /// Start bit sampled at the idle level
    StartError,
    /// Parity bit mismatch
    ParityError,
    /// Stop bit sampled at the wrong level
    FrameError,
    /// Control line went high
    High,
    /// Control line went low
    Low,
}

/// An event on a single line: chip select, control line change or framing anomaly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEvent {
    pub line: LineRole,
    pub kind: LineEventKind,
    pub timing: TimingInfo,
}

impl LineEvent {
    pub fn new(line: LineRole, kind: LineEventKind, timing: TimingInfo) -> Self {
        Self { line, kind, timing }
    }

    /// Label as shown in reports, e.g. `CSLOW`, `PARITY_ERR` or `CTS_HIGH`
    pub fn label(&self) -> String {
        match self.kind {
            LineEventKind::CsLow => "CSLOW".to_string(),
            LineEventKind::CsHigh => "CSHIGH".to_string(),
            LineEventKind::StartError => "START_ERR".to_string(),
            LineEventKind::ParityError => "PARITY_ERR".to_string(),
            LineEventKind::FrameError => "FRAME_ERR".to_string(),
            LineEventKind::High => format!("{}_HIGH", self.line.name().to_ascii_uppercase()),
            LineEventKind::Low => format!("{}_LOW", self.line.name().to_ascii_uppercase()),
        }
    }

    /// Whether this event reports a framing anomaly
    pub fn is_error(&self) -> bool {
        matches!(
            self.kind,
            LineEventKind::StartError | LineEventKind::ParityError | LineEventKind::FrameError
        )
    }
}

/// One entry of a decoder's output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Transfer(SpiTransfer),
    Symbol(UartSymbol),
    Line(LineEvent),
}

impl DecodedEvent {
    pub fn timing(&self) -> TimingInfo {
        match self {
            DecodedEvent::Transfer(t) => t.timing,
            DecodedEvent::Symbol(s) => s.timing,
            DecodedEvent::Line(l) => l.timing,
        }
    }

    /// Absolute sample index, the ordering key of the stream
    pub fn position(&self) -> u64 {
        self.timing().position
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DecodedEvent::Line(l) if l.is_error())
    }
}

/// Protocol that produced a [`Decoded`] stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Spi,
    Uart,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Spi => "SPI",
            Protocol::Uart => "UART",
        }
    }

    /// Lines shown in the primary and secondary report columns
    pub fn columns(self) -> (LineRole, LineRole) {
        match self {
            Protocol::Spi => (LineRole::Mosi, LineRole::Miso),
            Protocol::Uart => (LineRole::Rxd, LineRole::Txd),
        }
    }
}

/// Aggregate counters of one decode run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Data symbols (SPI words, UART characters)
    pub symbols: usize,
    /// START_ERR + PARITY_ERR + FRAME_ERR events
    pub errors: usize,
    /// Estimated samples per bit of the last UART data line that had one
    pub bit_length: Option<u64>,
    /// Set when at least one UART data line had no usable baud estimate
    pub estimation_failed: bool,
    /// First sample of the decoded region
    pub start: u64,
    /// The run was cancelled and the events are a partial result
    pub cancelled: bool,
}

impl DecodeStats {
    /// Estimated baud rate, when both the sample rate and a bit length are known
    pub fn baud_rate(&self, sample_rate: Option<u32>) -> Option<u64> {
        let rate = u64::from(sample_rate?);
        self.bit_length
            .filter(|&bits| bits > 0)
            .map(|bits| rate / bits)
    }
}

/// Result of a decode: the chronological event stream and its statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub protocol: Protocol,
    /// Width of a data word in bits
    pub word_bits: u8,
    pub events: Vec<DecodedEvent>,
    pub stats: DecodeStats,
}

impl Decoded {
    pub fn new(protocol: Protocol, word_bits: u8) -> Self {
        Self {
            protocol,
            word_bits,
            events: Vec::new(),
            stats: DecodeStats::default(),
        }
    }
}
