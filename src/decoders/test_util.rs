//! Synthetic waveform builder for decoder tests

use super::types::Parity;
use crate::capture::{Capture, CaptureHeader};

/// Raw per-sample channel words under construction
pub struct Waveform {
    samples: Vec<u32>,
}

impl Waveform {
    /// `len` samples, all channels in `idle` state
    pub fn new(len: usize, idle: u32) -> Self {
        Self {
            samples: vec![idle; len],
        }
    }

    /// Drive `channel` to `level` over `[from, to)`
    pub fn set(&mut self, channel: u8, from: usize, to: usize, level: bool) -> &mut Self {
        let to = to.min(self.samples.len());
        for sample in &mut self.samples[from.min(to)..to] {
            if level {
                *sample |= 1 << channel;
            } else {
                *sample &= !(1 << channel);
            }
        }
        self
    }

    /// Write one UART frame on an idle-high line starting at `start`.
    ///
    /// `stop_level` is the level driven during the stop bit; returns the first
    /// sample after the frame.
    #[allow(clippy::too_many_arguments)]
    pub fn uart_frame(
        &mut self,
        channel: u8,
        start: usize,
        bit: usize,
        value: u32,
        data_bits: u32,
        parity: Parity,
        stop_level: bool,
    ) -> usize {
        let mut at = start;
        self.set(channel, at, at + bit, false);
        at += bit;
        for i in 0..data_bits {
            self.set(channel, at, at + bit, value & (1 << i) != 0);
            at += bit;
        }
        if let Some(parity_bit) = parity.expected_bit(value) {
            self.set(channel, at, at + bit, parity_bit);
            at += bit;
        }
        self.set(channel, at, at + bit, stop_level);
        at += bit;
        self.set(channel, at, self.samples.len(), true);
        at
    }

    /// Channel words inverted on `channel`
    pub fn invert(&mut self, channel: u8) -> &mut Self {
        for sample in &mut self.samples {
            *sample ^= 1 << channel;
        }
        self
    }

    pub fn capture(&self, channels: u8) -> Capture {
        let header = CaptureHeader {
            sample_rate: Some(1_000_000),
            trigger_position: None,
            channels,
            enabled_channels: u32::MAX >> (32 - u32::from(channels)),
        };
        match Capture::from_samples(header, &self.samples) {
            Ok(capture) => capture,
            Err(e) => panic!("invalid synthetic capture: {}", e),
        }
    }
}
