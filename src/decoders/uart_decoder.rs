//! UART decoder
//!
//! Each data line (RxD, TxD) is decoded on its own: the bit length comes from
//! the [`BaudRateAnalyzer`], then frames are located by their start edge and
//! sampled in the middle of every bit cell. Control lines only report their
//! level changes. The per-line streams are merged with a stable sort on the
//! sample position, so simultaneous events keep the line order
//! RxD, TxD, CTS, RTS, DCD, RI, DSR, DTR.

use super::baud_rate::BaudRateAnalyzer;
use super::types::{
    Decoded, DecodedEvent, LineEvent, LineEventKind, LineRole, Parity, Protocol, StopBits,
    TimingInfo, UartSymbol, channel_mask, clamp_channel,
};
use crate::capture::Capture;
use crate::runtime::control::ProgressSpan;
use crate::runtime::{DecodeContext, DecodeError, DecodeResult, ProtocolDecoder};
use tracing::{debug, info, trace, warn};

/// Smallest and largest supported character width
pub const UART_BITS: std::ops::RangeInclusive<u8> = 5..=9;

/// Samples the decode region starts before the trigger
pub const TRIGGER_BACKOFF: u64 = 10;

/// UART line assignment and framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub rxd: Option<u8>,
    pub txd: Option<u8>,
    pub cts: Option<u8>,
    pub rts: Option<u8>,
    pub dtr: Option<u8>,
    pub dsr: Option<u8>,
    pub dcd: Option<u8>,
    pub ri: Option<u8>,
    pub parity: Parity,
    pub bits: u8,
    pub stop: StopBits,
    pub inverted: bool,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            rxd: Some(0),
            txd: Some(1),
            cts: None,
            rts: None,
            dtr: None,
            dsr: None,
            dcd: None,
            ri: None,
            parity: Parity::None,
            bits: 8,
            stop: StopBits::One,
            inverted: false,
        }
    }
}

impl UartConfig {
    /// 8N1 configuration on the given data lines, no control lines
    pub fn new(rxd: Option<u8>, txd: Option<u8>) -> Self {
        Self {
            rxd: rxd.map(|ch| clamp_channel(LineRole::Rxd, ch)),
            txd: txd.map(|ch| clamp_channel(LineRole::Txd, ch)),
            ..Self::default()
        }
    }

    /// Bind (or unbind) a line. Data lines are accepted too.
    pub fn with_line(mut self, role: LineRole, channel: Option<u8>) -> Self {
        let channel = channel.map(|ch| clamp_channel(role, ch));
        match role {
            LineRole::Rxd => self.rxd = channel,
            LineRole::Txd => self.txd = channel,
            LineRole::Cts => self.cts = channel,
            LineRole::Rts => self.rts = channel,
            LineRole::Dtr => self.dtr = channel,
            LineRole::Dsr => self.dsr = channel,
            LineRole::Dcd => self.dcd = channel,
            LineRole::Ri => self.ri = channel,
            other => warn!("{} is not a UART line, ignored", other),
        }
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Character width, clamped to 5..=9
    pub fn with_bits(mut self, bits: u8) -> Self {
        let clamped = bits.clamp(*UART_BITS.start(), *UART_BITS.end());
        if clamped != bits {
            warn!("UART character width {} out of range, using {}", bits, clamped);
        }
        self.bits = clamped;
        self
    }

    pub fn with_stop(mut self, stop: StopBits) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    fn data_lines(&self) -> impl Iterator<Item = (LineRole, u8)> {
        [(LineRole::Rxd, self.rxd), (LineRole::Txd, self.txd)]
            .into_iter()
            .filter_map(|(role, ch)| ch.map(|ch| (role, ch)))
    }

    fn control_lines(&self) -> impl Iterator<Item = (LineRole, u8)> {
        [
            (LineRole::Cts, self.cts),
            (LineRole::Rts, self.rts),
            (LineRole::Dcd, self.dcd),
            (LineRole::Ri, self.ri),
            (LineRole::Dsr, self.dsr),
            (LineRole::Dtr, self.dtr),
        ]
        .into_iter()
        .filter_map(|(role, ch)| ch.map(|ch| (role, ch)))
    }
}

/// Events and counters of one decoded line
#[derive(Debug, Default)]
struct LineDecode {
    events: Vec<DecodedEvent>,
    symbols: usize,
    errors: usize,
    cancelled: bool,
}

impl LineDecode {
    fn error(&mut self, line: LineRole, kind: LineEventKind, timing: TimingInfo) {
        trace!("{}: {:?} at {}", line, kind, timing.position);
        self.errors += 1;
        self.events
            .push(DecodedEvent::Line(LineEvent::new(line, kind, timing)));
    }
}

/// One asynchronous data line being decoded
struct DataLine<'a> {
    capture: &'a Capture,
    role: LineRole,
    mask: u32,
    bit: u64,
    config: &'a UartConfig,
}

impl DataLine<'_> {
    /// Logical level at `time`, with inversion applied
    fn bit_at(&self, time: u64) -> bool {
        self.capture.level_at(time, self.mask) != self.config.inverted
    }

    fn timing(&self, time: u64) -> TimingInfo {
        TimingInfo::at(self.capture, time)
    }

    /// Next start edge at or after `from`, before `end`
    fn next_start_edge(&self, from: u64, end: u64) -> Option<u64> {
        let edges = match from {
            0 => self.capture.line_edges(self.mask),
            _ => self.capture.line_edges_after(self.mask, from - 1),
        };
        let start_level = self.config.inverted;
        edges
            .take_while(|edge| edge.start_time < end)
            .find(|edge| edge.value == start_level)
            .map(|edge| edge.start_time)
    }

    fn decode(&self, ctx: &DecodeContext, start: u64, end: u64, span: &ProgressSpan) -> LineDecode {
        let config = self.config;
        let bit = self.bit;
        let data_bits = u32::from(config.bits);
        let frame_slots = u64::from(data_bits + config.parity.bits() + config.stop.slots());
        // First sample point of the start bit to the last stop-bit sample point
        let frame_span = bit / 2
            + u64::from(data_bits + config.parity.bits()) * bit
            + config.stop.span(bit);

        let mut out = LineDecode::default();
        let mut a = start;

        while end.saturating_sub(a) >= frame_slots * bit {
            if ctx.is_cancelled() {
                debug!("{}: cancelled at sample {}", self.role, a);
                out.cancelled = true;
                break;
            }

            let Some(edge) = self.next_start_edge(a, end) else {
                debug!("{}: no further start edge after {}", self.role, a);
                break;
            };
            if edge + frame_span >= self.capture.absolute_length() {
                debug!("{}: frame at {} runs past the end of the capture", self.role, edge);
                break;
            }

            // A bad start bit is flagged but the frame is still sampled
            a = edge + bit / 2;
            if self.bit_at(a) {
                out.error(self.role, LineEventKind::StartError, self.timing(a));
            }

            let mut value = 0u32;
            for i in 0..data_bits {
                a += bit;
                if self.bit_at(a) {
                    value |= 1 << i;
                }
            }

            if let Some(expected) = config.parity.expected_bit(value) {
                a += bit;
                if self.bit_at(a) != expected {
                    out.error(self.role, LineEventKind::ParityError, self.timing(a));
                }
            }

            a += bit;
            if !self.bit_at(a) {
                out.error(self.role, LineEventKind::FrameError, self.timing(a));
            }
            let extra_stop = match config.stop {
                StopBits::One => None,
                StopBits::OnePointFive => Some(bit / 2),
                StopBits::Two => Some(bit),
            };
            if let Some(offset) = extra_stop {
                a += offset;
                if !self.bit_at(a) {
                    out.error(self.role, LineEventKind::FrameError, self.timing(a));
                }
            }

            trace!("{}: 0x{:02X} at {}", self.role, value, a);
            out.symbols += 1;
            out.events.push(DecodedEvent::Symbol(UartSymbol {
                line: self.role,
                value,
                timing: self.timing(a),
            }));
            ctx.report(span, a);
        }

        out
    }
}

/// UART protocol decoder
#[derive(Debug, Clone)]
pub struct UartDecoder {
    name: String,
    config: UartConfig,
}

impl UartDecoder {
    pub fn new(config: UartConfig) -> Self {
        Self {
            name: "uart_decoder".to_string(),
            config,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Sample range to decode: cursors, else a little before the trigger, else
    /// the first edge on any configured line, else the whole capture.
    fn decode_bounds(capture: &Capture, lines_mask: u32) -> (u64, u64) {
        let end = capture.absolute_length();

        if let Some((a, b)) = capture.cursor_span() {
            debug!("Decoding between cursors {} and {}", a, b);
            return (a, b + 1);
        }
        if let Some(trigger) = capture.trigger_position() {
            let start = trigger.saturating_sub(TRIGGER_BACKOFF);
            debug!("Decoding from {} (trigger at {})", start, trigger);
            return (start, end);
        }
        if let Some(edge) = capture.first_edge(lines_mask) {
            debug!("Decoding from first edge at {}", edge);
            return (edge, end);
        }
        debug!("No edges, decoding the whole capture");
        (0, end)
    }

    fn control_line(
        capture: &Capture,
        ctx: &DecodeContext,
        role: LineRole,
        mask: u32,
        (start, end): (u64, u64),
        span: &ProgressSpan,
    ) -> LineDecode {
        let mut out = LineDecode::default();
        let edges = match start {
            0 => capture.line_edges(mask),
            _ => capture.line_edges_after(mask, start - 1),
        };
        for edge in edges.take_while(|edge| edge.start_time < end) {
            if ctx.is_cancelled() {
                debug!("{}: cancelled at sample {}", role, edge.start_time);
                out.cancelled = true;
                break;
            }
            trace!("{}: {}", role, edge);
            let kind = if edge.is_rising() {
                LineEventKind::High
            } else {
                LineEventKind::Low
            };
            out.events.push(DecodedEvent::Line(LineEvent::new(
                role,
                kind,
                TimingInfo::at(capture, edge.start_time),
            )));
            ctx.report(span, edge.start_time);
        }
        out
    }
}

impl ProtocolDecoder for UartDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, capture: &Capture, ctx: &DecodeContext) -> DecodeResult<Decoded> {
        let config = &self.config;
        let bits = config.bits.clamp(*UART_BITS.start(), *UART_BITS.end());
        let config = UartConfig { bits, ..*config };

        let data_lines: Vec<(LineRole, u32)> = config
            .data_lines()
            .map(|(role, ch)| (role, channel_mask(capture, role, ch)))
            .collect();
        let control_lines: Vec<(LineRole, u32)> = config
            .control_lines()
            .map(|(role, ch)| (role, channel_mask(capture, role, ch)))
            .collect();
        let lines_mask = data_lines
            .iter()
            .chain(&control_lines)
            .fold(0, |mask, (_, line)| mask | line);

        if data_lines.is_empty() && control_lines.is_empty() {
            return Err(DecodeError::InvalidConfig("no UART line assigned".into()));
        }

        let (start, end) = Self::decode_bounds(capture, lines_mask);
        let stages = (data_lines.len() + control_lines.len()) as u32;

        info!(
            "UART decode: samples {}..{}, {} data bits, parity {:?}, stop {:?}{}",
            start,
            end,
            bits,
            config.parity,
            config.stop,
            if config.inverted { ", inverted" } else { "" }
        );

        let mut decoded = Decoded::new(Protocol::Uart, bits);
        decoded.stats.start = start;
        let mut stage = 0;

        for &(role, mask) in &data_lines {
            let span = ProgressSpan::new(start, end).stage(stage, stages);
            stage += 1;

            let analyzer = BaudRateAnalyzer::new(capture, mask);
            debug!("{}: pulse widths {}", role, analyzer);
            let bit = analyzer.best();
            if bit == 0 {
                warn!("{}: no transitions, baud rate estimation failed", role);
                decoded.stats.estimation_failed = true;
                continue;
            }
            decoded.stats.bit_length = Some(bit);
            match capture.sample_rate() {
                Some(rate) => info!(
                    "{}: {} samples per bit, ~{} baud",
                    role,
                    bit,
                    u64::from(rate) / bit
                ),
                None => info!("{}: {} samples per bit", role, bit),
            }

            let line = DataLine {
                capture,
                role,
                mask,
                bit,
                config: &config,
            };
            let out = line.decode(ctx, start, end, &span);
            decoded.stats.symbols += out.symbols;
            decoded.stats.errors += out.errors;
            decoded.events.extend(out.events);
            if out.cancelled {
                decoded.stats.cancelled = true;
                break;
            }
        }

        if !decoded.stats.cancelled {
            for &(role, mask) in &control_lines {
                let span = ProgressSpan::new(start, end).stage(stage, stages);
                stage += 1;

                let out = Self::control_line(capture, ctx, role, mask, (start, end), &span);
                decoded.events.extend(out.events);
                if out.cancelled {
                    decoded.stats.cancelled = true;
                    break;
                }
            }
        }

        // Stable: simultaneous events keep line order
        decoded.events.sort_by_key(DecodedEvent::position);
        if !decoded.stats.cancelled {
            ctx.progress.update(100);
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::test_util::Waveform;
    use crate::runtime::{CancelToken, ProgressReporter};
    use crossbeam_channel::bounded;
    use std::thread;

    const RXD: u8 = 0;
    const TXD: u8 = 1;
    const CTS: u8 = 2;
    const BIT: usize = 10;

    fn decode(capture: &Capture, config: UartConfig) -> Decoded {
        match UartDecoder::new(config).decode(capture, &DecodeContext::default()) {
            Ok(decoded) => decoded,
            Err(e) => panic!("decode failed: {}", e),
        }
    }

    fn symbols(decoded: &Decoded) -> Vec<(LineRole, u32)> {
        decoded
            .events
            .iter()
            .filter_map(|event| match event {
                DecodedEvent::Symbol(s) => Some((s.line, s.value)),
                _ => None,
            })
            .collect()
    }

    fn labels(decoded: &Decoded) -> Vec<String> {
        decoded
            .events
            .iter()
            .filter_map(|event| match event {
                DecodedEvent::Line(l) => Some(l.label()),
                _ => None,
            })
            .collect()
    }

    fn rxd_only() -> UartConfig {
        UartConfig::new(Some(RXD), None)
    }

    #[test]
    fn test_config_clamps() {
        let config = UartConfig::new(Some(50), None).with_bits(12);
        assert_eq!(config.rxd, Some(31));
        assert_eq!(config.bits, 9);
        assert_eq!(UartConfig::default().with_bits(3).bits, 5);

        let config = UartConfig::default().with_line(LineRole::Cts, Some(4));
        assert_eq!(config.cts, Some(4));
        assert_eq!(config.with_line(LineRole::Cts, None).cts, None);
    }

    #[test]
    fn test_8n1_single_byte() {
        let mut wave = Waveform::new(200, 0b11);
        wave.uart_frame(RXD, 50, BIT, 0x41, 8, Parity::None, true);
        let capture = wave.capture(2);
        let decoded = decode(&capture, rxd_only());

        assert_eq!(symbols(&decoded), vec![(LineRole::Rxd, 0x41)]);
        assert_eq!(decoded.stats.symbols, 1);
        assert_eq!(decoded.stats.errors, 0);
        assert_eq!(decoded.stats.bit_length, Some(10));
        assert!(labels(&decoded).is_empty());
        // Last stop-bit sample point: start edge + half a bit + 9 bits
        assert_eq!(decoded.events[0].position(), 50 + 5 + 90);
    }

    #[test]
    fn test_stop_bit_forced_low() {
        let mut wave = Waveform::new(200, 0b11);
        wave.uart_frame(RXD, 50, BIT, 0x41, 8, Parity::None, false);
        let capture = wave.capture(2);
        let decoded = decode(&capture, rxd_only());

        assert_eq!(labels(&decoded), vec!["FRAME_ERR"]);
        assert_eq!(symbols(&decoded), vec![(LineRole::Rxd, 0x41)]);
        assert_eq!(decoded.stats.errors, 1);
        // The error and the symbol share the stop-bit sample point
        assert!(matches!(decoded.events[0], DecodedEvent::Line(_)));
        assert_eq!(decoded.events[0].position(), decoded.events[1].position());
    }

    #[test]
    fn test_parity() {
        let mut wave = Waveform::new(400, 0b11);
        let next = wave.uart_frame(RXD, 30, BIT, 0x43, 8, Parity::Even, true);
        // Second frame carries odd parity while the line is configured even
        wave.uart_frame(RXD, next + 40, BIT, 0x43, 8, Parity::Odd, true);
        let capture = wave.capture(2);
        let decoded = decode(&capture, rxd_only().with_parity(Parity::Even));

        assert_eq!(
            symbols(&decoded),
            vec![(LineRole::Rxd, 0x43), (LineRole::Rxd, 0x43)]
        );
        assert_eq!(labels(&decoded), vec!["PARITY_ERR"]);
        assert_eq!(decoded.stats.errors, 1);
    }

    #[test]
    fn test_seven_bits_two_stop() {
        let mut wave = Waveform::new(400, 0b11);
        let mut at = 20;
        for byte in [0x55, 0x2A] {
            // Two stop bits: the line idles high for another bit after the frame
            at = wave.uart_frame(RXD, at, BIT, byte, 7, Parity::None, true) + BIT;
        }
        let capture = wave.capture(2);
        let config = rxd_only().with_bits(7).with_stop(StopBits::Two);
        let decoded = decode(&capture, config);

        assert_eq!(
            symbols(&decoded),
            vec![(LineRole::Rxd, 0x55), (LineRole::Rxd, 0x2A)]
        );
        assert_eq!(decoded.stats.errors, 0);
    }

    #[test]
    fn test_inverted_line() {
        let mut wave = Waveform::new(200, 0b11);
        wave.uart_frame(RXD, 50, BIT, 0x41, 8, Parity::None, true);
        wave.invert(RXD);
        let capture = wave.capture(2);
        let decoded = decode(&capture, rxd_only().with_inverted(true));

        assert_eq!(symbols(&decoded), vec![(LineRole::Rxd, 0x41)]);
        assert_eq!(decoded.stats.errors, 0);
    }

    #[test]
    fn test_start_error_keeps_frame() {
        let mut wave = Waveform::new(600, 0b11);
        let mut at = 20;
        for _ in 0..3 {
            at = wave.uart_frame(RXD, at, BIT, 0x55, 8, Parity::None, true) + 30;
        }
        // Start bit cut to 4 samples, so it reads high at its centre
        wave.uart_frame(RXD, at, BIT, 0x41, 8, Parity::None, true);
        wave.set(RXD, at + 4, at + BIT, true);
        let capture = wave.capture(2);
        let decoded = decode(&capture, rxd_only());

        assert_eq!(at, 410);
        assert_eq!(labels(&decoded), vec!["START_ERR"]);
        assert_eq!(
            symbols(&decoded),
            vec![
                (LineRole::Rxd, 0x55),
                (LineRole::Rxd, 0x55),
                (LineRole::Rxd, 0x55),
                (LineRole::Rxd, 0x41)
            ]
        );
        assert_eq!(decoded.stats.errors, 1);

        let positions: Vec<u64> = decoded.events.iter().map(DecodedEvent::position).collect();
        assert_eq!(positions, vec![115, 245, 375, 415, 505]);
    }

    #[test]
    fn test_one_and_a_half_stop_bits() {
        let mut wave = Waveform::new(450, 0b11);
        let next = wave.uart_frame(RXD, 20, BIT, 0x55, 8, Parity::None, true);
        assert_eq!(next, 120);
        // Proper 1.5 stop bits before the second frame
        let next = wave.uart_frame(RXD, 125, BIT, 0x55, 8, Parity::None, true);
        // Only one stop bit before the third: the half-bit sample reads its start bit
        wave.uart_frame(RXD, next, BIT, 0x55, 8, Parity::None, true);
        let capture = wave.capture(2);
        let decoded = decode(&capture, rxd_only().with_stop(StopBits::OnePointFive));

        assert_eq!(symbols(&decoded), vec![(LineRole::Rxd, 0x55); 3]);
        assert_eq!(labels(&decoded), vec!["FRAME_ERR"]);
        assert_eq!(decoded.stats.errors, 1);

        let positions: Vec<u64> = decoded.events.iter().map(DecodedEvent::position).collect();
        assert_eq!(positions, vec![120, 225, 225, 325]);
        assert!(matches!(decoded.events[1], DecodedEvent::Line(_)));
    }

    #[test]
    fn test_cursor_bounded_region() {
        let mut wave = Waveform::new(400, 0b11);
        wave.uart_frame(RXD, 20, BIT, 0x41, 8, Parity::None, true);
        wave.uart_frame(RXD, 200, BIT, 0x42, 8, Parity::None, true);
        let mut capture = wave.capture(2);
        capture.set_cursor_a(350);
        capture.set_cursor_b(150);
        capture.set_cursor_enabled(true);
        let decoded = decode(&capture, rxd_only());

        assert_eq!(decoded.stats.start, 150);
        assert_eq!(symbols(&decoded), vec![(LineRole::Rxd, 0x42)]);
        assert_eq!(decoded.events[0].position(), 295);

        // A span too short for a whole frame decodes nothing
        capture.set_cursor_b(300);
        let decoded = decode(&capture, rxd_only());
        assert!(symbols(&decoded).is_empty());
    }

    #[test]
    fn test_region_without_trigger_or_cursors() {
        let mut wave = Waveform::new(200, 0b11);
        wave.uart_frame(RXD, 50, BIT, 0x41, 8, Parity::None, true);
        let decoded = decode(&wave.capture(2), rxd_only());
        assert_eq!(decoded.stats.start, 50);

        // No edge on any configured line: the whole capture is scanned
        let mut idle = Waveform::new(200, 0b11);
        idle.set(TXD, 80, 90, false);
        let decoded = decode(&idle.capture(2), rxd_only());
        assert_eq!(decoded.stats.start, 0);
        assert!(decoded.events.is_empty());
        assert!(decoded.stats.estimation_failed);
    }

    #[test]
    fn test_frame_reaching_capture_end_is_dropped() {
        for (len, expected) in [(245, 1), (246, 2)] {
            let mut wave = Waveform::new(len, 0b11);
            wave.uart_frame(RXD, 20, BIT, 0x41, 8, Parity::None, true);
            wave.uart_frame(RXD, 150, BIT, 0x41, 8, Parity::None, true);
            let decoded = decode(&wave.capture(2), rxd_only());

            // The second frame's last stop sample falls at 245
            assert_eq!(decoded.stats.symbols, expected, "capture of {} samples", len);
            assert_eq!(decoded.stats.errors, 0);
        }
    }

    #[test]
    fn test_no_lines_configured() {
        let capture = Waveform::new(100, 0b11).capture(2);
        let decoder = UartDecoder::new(UartConfig::new(None, None));
        let result = decoder.decode(&capture, &DecodeContext::default());
        assert!(matches!(result, Err(DecodeError::InvalidConfig(_))));
    }

    #[test]
    fn test_no_transitions() {
        let capture = Waveform::new(100, 0b11).capture(2);
        let decoded = decode(&capture, UartConfig::default());
        assert!(decoded.events.is_empty());
        assert!(decoded.stats.estimation_failed);
        assert_eq!(decoded.stats.bit_length, None);
    }

    #[test]
    fn test_rxd_txd_and_control_lines_merge() {
        let mut wave = Waveform::new(300, 0b111);
        wave.uart_frame(RXD, 20, BIT, 0x55, 8, Parity::None, true);
        wave.uart_frame(TXD, 60, BIT, 0x41, 8, Parity::None, true);
        wave.set(CTS, 10, 115, false);
        let capture = wave.capture(3);
        let config = UartConfig::new(Some(RXD), Some(TXD)).with_line(LineRole::Cts, Some(CTS));
        let decoded = decode(&capture, config);

        let order: Vec<String> = decoded
            .events
            .iter()
            .map(|event| match event {
                DecodedEvent::Symbol(s) => format!("{}:{:02X}", s.line, s.value),
                DecodedEvent::Line(l) => l.label(),
                DecodedEvent::Transfer(_) => unreachable!(),
            })
            .collect();
        // RxD symbol at 115 ties with CTS going high and keeps its line order
        assert_eq!(order, vec!["CTS_LOW", "RxD:55", "CTS_HIGH", "TxD:41"]);
        assert!(decoded.events.windows(2).all(|w| w[0].position() <= w[1].position()));
        assert_eq!(decoded.stats.symbols, 2);
    }

    #[test]
    fn test_trigger_backoff_and_relative_time() {
        let mut wave = Waveform::new(300, 0b11);
        wave.uart_frame(RXD, 100, BIT, 0x41, 8, Parity::None, true);
        let plain = wave.capture(2);
        let header = crate::capture::CaptureHeader {
            trigger_position: Some(105),
            ..*plain.header()
        };
        let capture = Capture::from_transitions(
            header,
            plain.values().to_vec(),
            plain.timestamps().to_vec(),
            plain.absolute_length(),
        )
        .unwrap();
        let decoded = decode(&capture, rxd_only());

        assert_eq!(decoded.stats.start, 95);
        assert_eq!(symbols(&decoded), vec![(LineRole::Rxd, 0x41)]);
        assert_eq!(decoded.events[0].timing(), TimingInfo::new(195, 90));
    }

    #[test]
    fn test_cancel_yields_prefix() {
        let mut wave = Waveform::new(20 + 40 * 120, 0b11);
        let mut at = 20;
        for frame in 0..40 {
            let byte = if frame % 2 == 0 { 0x55 } else { 0xAA };
            at = wave.uart_frame(RXD, at, BIT, byte, 8, Parity::None, true) + 20;
        }
        let capture = wave.capture(2);
        let decoder = UartDecoder::new(rxd_only());
        let full = decoder.decode(&capture, &DecodeContext::default()).unwrap();
        assert_eq!(full.stats.symbols, 40);

        let cancel = CancelToken::new();
        let (tx, rx) = bounded(0);
        let ctx = DecodeContext::new(cancel.clone(), ProgressReporter::new(tx));
        let partial = thread::scope(|s| {
            let worker = s.spawn(|| decoder.decode(&capture, &ctx));
            for percent in rx.iter() {
                if percent >= 50 {
                    cancel.cancel();
                    break;
                }
            }
            drop(rx);
            worker.join().unwrap()
        })
        .unwrap();

        assert!(partial.stats.cancelled);
        assert!(!partial.events.is_empty());
        assert!(partial.events.len() < full.events.len());
        assert_eq!(partial.events[..], full.events[..partial.events.len()]);
    }
}
