//! Protocol decoders
//!
//! Decoders turn a [`Capture`] into a chronological stream of
//! [`DecodedEvent`]s. [`Decoder`] is the closed set of protocols the crate
//! knows about.

pub mod baud_rate;
pub mod spi_decoder;
pub mod types;
pub mod uart_decoder;

#[cfg(test)]
pub(crate) mod test_util;

pub use baud_rate::BaudRateAnalyzer;
pub use spi_decoder::{SpiConfig, SpiDecoder};
pub use types::{
    BitOrder, DecodeStats, Decoded, DecodedEvent, LineEvent, LineEventKind, LineRole, Parity,
    Protocol, SpiMode, SpiTransfer, StopBits, TimingInfo, UartSymbol, parse_channel,
};
pub use uart_decoder::{UartConfig, UartDecoder};

use crate::capture::Capture;
use crate::runtime::{DecodeContext, DecodeResult, ProtocolDecoder};

/// Any supported protocol decoder
#[derive(Debug, Clone)]
pub enum Decoder {
    Spi(SpiDecoder),
    Uart(UartDecoder),
}

impl Decoder {
    pub fn protocol(&self) -> Protocol {
        match self {
            Decoder::Spi(_) => Protocol::Spi,
            Decoder::Uart(_) => Protocol::Uart,
        }
    }
}

impl From<SpiDecoder> for Decoder {
    fn from(decoder: SpiDecoder) -> Self {
        Decoder::Spi(decoder)
    }
}

impl From<UartDecoder> for Decoder {
    fn from(decoder: UartDecoder) -> Self {
        Decoder::Uart(decoder)
    }
}

impl ProtocolDecoder for Decoder {
    fn name(&self) -> &str {
        match self {
            Decoder::Spi(d) => d.name(),
            Decoder::Uart(d) => d.name(),
        }
    }

    fn decode(&self, capture: &Capture, ctx: &DecodeContext) -> DecodeResult<Decoded> {
        match self {
            Decoder::Spi(d) => d.decode(capture, ctx),
            Decoder::Uart(d) => d.decode(capture, ctx),
        }
    }
}
