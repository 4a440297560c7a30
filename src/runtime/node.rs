//! Decoder trait for protocol analysis
//!
//! Defines the ProtocolDecoder trait that all protocol decoders implement.
//! A decoder is a pure transformation: it reads an immutable capture plus its own
//! configuration and produces an ordered event sequence.

use super::control::DecodeContext;
use super::errors::DecodeResult;
use crate::capture::Capture;
use crate::decoders::Decoded;

/// A protocol decoder over a captured waveform
pub trait ProtocolDecoder: Send {
    /// Get a debug name for this decoder
    fn name(&self) -> &str;

    /// Decode the capture into a chronological event sequence.
    ///
    /// Implementations poll `ctx` for cancellation on every loop iteration and
    /// return the events emitted so far when it fires, with
    /// `Decoded::stats.cancelled` set.
    fn decode(&self, capture: &Capture, ctx: &DecodeContext) -> DecodeResult<Decoded>;
}
