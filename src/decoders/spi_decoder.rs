//! SPI decoder: single linear pass over the capture transitions
//!
//! Flow:
//!   1. Pick the decode region: cursor span if enabled, else the first /CS
//!      falling edge, else the trigger position
//!   2. Walk every transition in the region tracking SCK and /CS levels
//!   3. On each sampling edge of SCK shift one MOSI and one MISO bit in
//!   4. After `bits` bits emit an [`SpiTransfer`] and start a new word
//!   5. Emit CSLOW/CSHIGH on every /CS change
//!
//! The cancel token is polled on every transition; a cancelled run returns the
//! events emitted so far.

use super::types::{
    BitOrder, Decoded, DecodedEvent, LineEvent, LineEventKind, LineRole, Protocol, SpiMode,
    SpiTransfer, TimingInfo, channel_mask, clamp_channel,
};
use crate::capture::Capture;
use crate::runtime::control::ProgressSpan;
use crate::runtime::{DecodeContext, DecodeError, DecodeResult, ProtocolDecoder};
use tracing::{debug, info, trace, warn};

/// Smallest and largest supported SPI word
pub const SPI_BITS: std::ops::RangeInclusive<u8> = 4..=16;

/// SPI line assignment and framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    pub sck: u8,
    pub miso: u8,
    pub mosi: u8,
    pub cs: u8,
    pub mode: SpiMode,
    pub bits: u8,
    pub order: BitOrder,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            sck: 0,
            miso: 1,
            mosi: 2,
            cs: 3,
            mode: SpiMode::Mode0,
            bits: 8,
            order: BitOrder::MsbFirst,
        }
    }
}

impl SpiConfig {
    /// Configuration with the given channels and 8-bit mode-0 MSB-first framing
    pub fn new(sck: u8, miso: u8, mosi: u8, cs: u8) -> Self {
        Self {
            sck: clamp_channel(LineRole::Sck, sck),
            miso: clamp_channel(LineRole::Miso, miso),
            mosi: clamp_channel(LineRole::Mosi, mosi),
            cs: clamp_channel(LineRole::Cs, cs),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Word width, clamped to 4..=16
    pub fn with_bits(mut self, bits: u8) -> Self {
        let clamped = bits.clamp(*SPI_BITS.start(), *SPI_BITS.end());
        if clamped != bits {
            warn!("SPI word width {} out of range, using {}", bits, clamped);
        }
        self.bits = clamped;
        self
    }

    pub fn with_order(mut self, order: BitOrder) -> Self {
        self.order = order;
        self
    }
}

/// SPI protocol decoder
#[derive(Debug, Clone)]
pub struct SpiDecoder {
    name: String,
    config: SpiConfig,
}

impl SpiDecoder {
    pub fn new(config: SpiConfig) -> Self {
        Self {
            name: "spi_decoder".to_string(),
            config,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Transition index range to decode, and whether it starts on a /CS
    /// falling edge.
    fn decode_bounds(capture: &Capture, cs: u32) -> DecodeResult<(usize, usize, bool)> {
        let len = capture.transition_count();

        if let Some((a, b)) = capture.cursor_span() {
            debug!("Decoding between cursors {} and {}", a, b);
            return Ok((capture.sample_index_at(a), capture.sample_index_at(b) + 1, false));
        }

        if let Some(edge) = capture.line_edges(cs).find(|edge| !edge.is_rising()) {
            debug!("Found /CS falling edge at {}", edge.start_time);
            return Ok((capture.sample_index_at(edge.start_time), len, true));
        }

        if let Some(trigger) = capture.trigger_position() {
            debug!("No /CS falling edge, starting at trigger {}", trigger);
            return Ok((capture.sample_index_at(trigger), len, false));
        }

        Err(DecodeError::NoStartPoint)
    }
}

impl ProtocolDecoder for SpiDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, capture: &Capture, ctx: &DecodeContext) -> DecodeResult<Decoded> {
        let config = &self.config;
        let sck = channel_mask(capture, LineRole::Sck, config.sck);
        let mosi = channel_mask(capture, LineRole::Mosi, config.mosi);
        let miso = channel_mask(capture, LineRole::Miso, config.miso);
        let cs = channel_mask(capture, LineRole::Cs, config.cs);
        let bits = u32::from(config.bits.clamp(*SPI_BITS.start(), *SPI_BITS.end()));
        let sample_on_rising = config.mode.samples_on_rising();

        let (start, end, cs_start) = Self::decode_bounds(capture, cs)?;
        let values = capture.values();
        let timestamps = capture.timestamps();

        let mut decoded = Decoded::new(Protocol::Spi, bits as u8);
        decoded.stats.start = timestamps[start];
        let span = ProgressSpan::new(timestamps[start], timestamps[end - 1]);

        info!(
            "SPI decode: {} transitions from sample {}, mode {:?}, {} bits {:?}",
            end - start,
            timestamps[start],
            config.mode,
            bits,
            config.order
        );
        debug!("Masks: sck={:#x} mosi={:#x} miso={:#x} cs={:#x}", sck, mosi, miso, cs);

        if cs_start {
            decoded.events.push(DecodedEvent::Line(LineEvent::new(
                LineRole::Cs,
                LineEventKind::CsLow,
                TimingInfo::at(capture, timestamps[start]),
            )));
        }

        let mut prev_clk = values[start] & sck != 0;
        let mut prev_cs = values[start] & cs != 0;
        let mut mosi_word: u32 = 0;
        let mut miso_word: u32 = 0;
        let mut bits_collected: u32 = 0;

        for (&value, &time) in values[start..end].iter().zip(&timestamps[start..end]) {
            if ctx.is_cancelled() {
                debug!("SPI decode cancelled at sample {}", time);
                decoded.stats.cancelled = true;
                break;
            }

            let clk = value & sck != 0;
            let is_sampling_edge = if sample_on_rising {
                !prev_clk && clk
            } else {
                prev_clk && !clk
            };
            prev_clk = clk;

            if is_sampling_edge {
                let bit = match config.order {
                    BitOrder::MsbFirst => bits - 1 - bits_collected,
                    BitOrder::LsbFirst => bits_collected,
                };
                if value & mosi != 0 {
                    mosi_word |= 1 << bit;
                }
                if value & miso != 0 {
                    miso_word |= 1 << bit;
                }
                trace!(
                    "bit {}: SCK edge at {}, MOSI={} MISO={}",
                    bits_collected,
                    time,
                    value & mosi != 0,
                    value & miso != 0
                );

                bits_collected += 1;
                if bits_collected == bits {
                    decoded.stats.symbols += 1;
                    debug!(
                        "#{}: MOSI=0x{:02X} MISO=0x{:02X} at {}",
                        decoded.stats.symbols, mosi_word, miso_word, time
                    );
                    decoded.events.push(DecodedEvent::Transfer(SpiTransfer {
                        mosi: mosi_word,
                        miso: miso_word,
                        timing: TimingInfo::at(capture, time),
                    }));
                    mosi_word = 0;
                    miso_word = 0;
                    bits_collected = 0;
                }
            }

            let cs_level = value & cs != 0;
            if cs_level != prev_cs {
                let kind = if cs_level {
                    LineEventKind::CsHigh
                } else {
                    LineEventKind::CsLow
                };
                decoded.events.push(DecodedEvent::Line(LineEvent::new(
                    LineRole::Cs,
                    kind,
                    TimingInfo::at(capture, time),
                )));
            }
            prev_cs = cs_level;

            ctx.report(&span, time);
        }

        if bits_collected > 0 {
            debug!("Incomplete word at end: {}/{} bits", bits_collected, bits);
        }
        if !decoded.stats.cancelled {
            ctx.progress.update(100);
        }

        Ok(decoded)
    }
}
