//! SUMP capture file reader/writer
//!
//! Capture files are line oriented. A header of `;Key: value` lines is followed
//! by the data lines:
//!
//! ```text
//! ;Size: 3
//! ;Rate: 1000000
//! ;Channels: 32
//! ;EnabledChannels: -1
//! ;TriggerPosition: 12
//! ;CursorEnabled: false
//! ;CursorA: 0
//! ;CursorB: 0
//! ;Compressed: true
//! ;AbsoluteLength: 100
//! 00000000@0
//! 00000001@12
//! 00000003@40
//! ```
//!
//! In the compressed format every data line is one transition: 8 hex digits
//! (the 32-bit channel word), `@`, and the decimal sample index. Files without
//! `;Compressed: true` use the legacy format with one hex word per raw sample
//! (4 digits for captures of up to 16 channels, 8 digits otherwise) and are
//! compressed on load.

use super::store::{Capture, CaptureHeader};
use crate::{Result, SumpError};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Largest sample count accepted for legacy (uncompressed) files
const MAX_LEGACY_SIZE: usize = 256 * 1024;
/// Largest transition count accepted for compressed files
const MAX_COMPRESSED_SIZE: usize = 1 << 28;
/// Upper bound on the buffer reserved from the header's `Size` before data is read
const MAX_RESERVE: usize = 1 << 16;

/// Header fields as they appear in the file, before validation
#[derive(Debug)]
struct RawHeader {
    size: Option<usize>,
    rate: i64,
    channels: u8,
    enabled_channels: u32,
    trigger_position: i64,
    cursor_enabled: bool,
    cursor_a: i64,
    cursor_b: i64,
    compressed: bool,
    absolute_length: Option<u64>,
}

impl Default for RawHeader {
    fn default() -> Self {
        Self {
            size: None,
            rate: -1,
            channels: 32,
            enabled_channels: u32::MAX,
            trigger_position: -1,
            cursor_enabled: false,
            cursor_a: 0,
            cursor_b: 0,
            compressed: false,
            absolute_length: None,
        }
    }
}

/// Reader and writer for SUMP capture files
pub struct SumpFile;

impl SumpFile {
    /// Load a capture from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Capture> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let capture = Self::read(BufReader::new(file))?;
        info!(
            "Loaded {}: {} transitions over {} samples",
            path.display(),
            capture.transition_count(),
            capture.absolute_length()
        );
        Ok(capture)
    }

    /// Save a capture in the compressed format
    pub fn save<P: AsRef<Path>>(capture: &Capture, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write(capture, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse a capture from any buffered reader
    pub fn read<R: BufRead>(reader: R) -> Result<Capture> {
        let mut lines = reader.lines();
        let mut header = RawHeader::default();
        let mut line_number = 0usize;

        // Header: everything up to the first line not starting with ';'
        let first_data = loop {
            let Some(line) = lines.next() else {
                return Err(SumpError::ParseHeader(
                    "file appears to be corrupted: no data after header".to_string(),
                ));
            };
            let line = line?;
            line_number += 1;

            if line.starts_with(';') {
                Self::parse_header_line(&mut header, line.trim_end())?;
            } else {
                break line;
            }
        };

        let size = header
            .size
            .ok_or_else(|| SumpError::MissingField("Size".to_string()))?;
        if !(1..=32).contains(&header.channels) {
            return Err(SumpError::ParseHeader(format!(
                "channel count must be 1-32, got {}",
                header.channels
            )));
        }

        let capture_header = CaptureHeader {
            sample_rate: u32::try_from(header.rate).ok(),
            trigger_position: u64::try_from(header.trigger_position).ok(),
            channels: header.channels,
            enabled_channels: header.enabled_channels,
        };

        debug!(
            "Header: size={} rate={:?} channels={} trigger={:?} compressed={}",
            size,
            capture_header.sample_rate,
            capture_header.channels,
            capture_header.trigger_position,
            header.compressed
        );

        let data_lines = std::iter::once(Ok(first_data)).chain(lines);
        let mut capture = if header.compressed {
            if !(1..=MAX_COMPRESSED_SIZE).contains(&size) {
                return Err(SumpError::InvalidSize(format!(
                    "compressed size must be 1-{}, got {}",
                    MAX_COMPRESSED_SIZE, size
                )));
            }
            let absolute_length = header
                .absolute_length
                .ok_or_else(|| SumpError::MissingField("AbsoluteLength".to_string()))?;

            let mut values = Vec::with_capacity(size.min(MAX_RESERVE));
            let mut timestamps = Vec::with_capacity(size.min(MAX_RESERVE));
            Self::read_data(data_lines, line_number, size, |line, number| {
                let (value, timestamp) = Self::parse_transition(line, number)?;
                values.push(value);
                timestamps.push(timestamp);
                Ok(())
            })?;
            Capture::from_transitions(capture_header, values, timestamps, absolute_length)?
        } else {
            if !(1..=MAX_LEGACY_SIZE).contains(&size) {
                return Err(SumpError::InvalidSize(format!(
                    "legacy size must be 1-{}, got {}",
                    MAX_LEGACY_SIZE, size
                )));
            }
            let digits = if header.channels > 16 { 8 } else { 4 };

            let mut samples = Vec::with_capacity(size.min(MAX_RESERVE));
            Self::read_data(data_lines, line_number, size, |line, number| {
                samples.push(Self::parse_hex(line, digits, number)?);
                Ok(())
            })?;
            Capture::from_samples(capture_header, &samples)?
        };

        capture.set_cursor_a(header.cursor_a);
        capture.set_cursor_b(header.cursor_b);
        capture.set_cursor_enabled(header.cursor_enabled);
        Ok(capture)
    }

    /// Write a capture in the compressed format.
    ///
    /// This is the exact inverse of [`SumpFile::read`] for compressed files.
    pub fn write<W: Write>(capture: &Capture, writer: &mut W) -> Result<()> {
        let header = capture.header();
        let rate = header.sample_rate.map_or(-1, i64::from);

        writeln!(writer, ";Size: {}", capture.transition_count())?;
        writeln!(writer, ";Rate: {}", rate)?;
        writeln!(writer, ";Channels: {}", header.channels)?;
        writeln!(writer, ";EnabledChannels: {}", header.enabled_channels as i32)?;
        if let Some(trigger) = header.trigger_position {
            writeln!(writer, ";TriggerPosition: {}", trigger)?;
        }
        writeln!(writer, ";CursorEnabled: {}", capture.cursor_enabled())?;
        writeln!(writer, ";CursorA: {}", capture.cursor_a())?;
        writeln!(writer, ";CursorB: {}", capture.cursor_b())?;
        writeln!(writer, ";Compressed: true")?;
        writeln!(writer, ";AbsoluteLength: {}", capture.absolute_length())?;

        for (value, timestamp) in capture.values().iter().zip(capture.timestamps()) {
            writeln!(writer, "{:08x}@{}", value, timestamp)?;
        }
        Ok(())
    }

    // ── Associated Functions (Helpers) ──────────────────────────────────

    fn parse_header_line(header: &mut RawHeader, line: &str) -> Result<()> {
        if let Some(value) = line.strip_prefix(";Size: ") {
            header.size = Some(Self::parse_field("Size", value)?);
        } else if let Some(value) = line.strip_prefix(";Rate: ") {
            header.rate = Self::parse_field("Rate", value)?;
        } else if let Some(value) = line.strip_prefix(";Channels: ") {
            header.channels = Self::parse_field("Channels", value)?;
        } else if let Some(value) = line.strip_prefix(";EnabledChannels: ") {
            // Written as a signed 32-bit integer, so -1 means all channels
            let mask: i64 = Self::parse_field("EnabledChannels", value)?;
            header.enabled_channels = mask as u32;
        } else if let Some(value) = line.strip_prefix(";TriggerPosition: ") {
            header.trigger_position = Self::parse_field("TriggerPosition", value)?;
        } else if let Some(value) = line.strip_prefix(";CursorEnabled: ") {
            header.cursor_enabled = Self::parse_bool("CursorEnabled", value)?;
        } else if let Some(value) = line.strip_prefix(";CursorA: ") {
            header.cursor_a = Self::parse_field("CursorA", value)?;
        } else if let Some(value) = line.strip_prefix(";CursorB: ") {
            header.cursor_b = Self::parse_field("CursorB", value)?;
        } else if let Some(value) = line.strip_prefix(";Compressed: ") {
            header.compressed = Self::parse_bool("Compressed", value)?;
        } else if let Some(value) = line.strip_prefix(";AbsoluteLength: ") {
            header.absolute_length = Some(Self::parse_field("AbsoluteLength", value)?);
        }
        // Other ';' lines are comments
        Ok(())
    }

    fn parse_field<T: FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| SumpError::ParseHeader(format!("invalid {}: {:?}", key, value)))
    }

    fn parse_bool(key: &str, value: &str) -> Result<bool> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("true") => Ok(true),
            v if v.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(SumpError::ParseHeader(format!(
                "invalid {}: {:?}",
                key, value
            ))),
        }
    }

    /// Feed `size` non-empty data lines to `handle`, failing on truncation
    fn read_data<I, F>(lines: I, header_lines: usize, size: usize, mut handle: F) -> Result<()>
    where
        I: Iterator<Item = std::io::Result<String>>,
        F: FnMut(&str, usize) -> Result<()>,
    {
        let mut count = 0;
        // The first data line was already counted while reading the header
        let mut number = header_lines - 1;

        for line in lines {
            let line = line?;
            number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            handle(line, number)?;
            count += 1;
            if count == size {
                return Ok(());
            }
        }

        Err(SumpError::InvalidData {
            line: number,
            reason: format!("expected {} data lines, found {}", size, count),
        })
    }

    /// Parse a compressed data line: `XXXXXXXX@timestamp`
    fn parse_transition(line: &str, number: usize) -> Result<(u32, u64)> {
        let (hex, timestamp) = line.split_once('@').ok_or_else(|| SumpError::InvalidData {
            line: number,
            reason: format!("missing '@' in {:?}", line),
        })?;
        let value = Self::parse_hex(hex, 8, number)?;
        let timestamp = timestamp.parse().map_err(|_| SumpError::InvalidData {
            line: number,
            reason: format!("invalid timestamp {:?}", timestamp),
        })?;
        Ok((value, timestamp))
    }

    /// Parse a word of exactly `digits` hex digits
    fn parse_hex(text: &str, digits: usize, number: usize) -> Result<u32> {
        Some(text)
            .filter(|hex| hex.len() == digits && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .ok_or_else(|| SumpError::InvalidData {
                line: number,
                reason: format!("expected {} hex digits, got {:?}", digits, text),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const COMPRESSED: &str = ";Size: 3
;Rate: 1000000
;Channels: 32
;EnabledChannels: -1
;TriggerPosition: 12
;CursorEnabled: true
;CursorA: 5
;CursorB: 60
;Compressed: true
;AbsoluteLength: 100
00000000@0
00000001@12
8000000f@40
";

    fn load(text: &str) -> Result<Capture> {
        SumpFile::read(Cursor::new(text))
    }

    #[test]
    fn test_read_compressed() {
        let capture = load(COMPRESSED).unwrap();
        assert_eq!(capture.values(), &[0, 1, 0x8000_000F]);
        assert_eq!(capture.timestamps(), &[0, 12, 40]);
        assert_eq!(capture.absolute_length(), 100);
        assert_eq!(capture.sample_rate(), Some(1_000_000));
        assert_eq!(capture.trigger_position(), Some(12));
        assert_eq!(capture.channels(), 32);
        assert_eq!(capture.enabled_channels(), u32::MAX);
        assert!(capture.cursor_enabled());
        assert_eq!(capture.cursor_a(), 5);
        assert_eq!(capture.cursor_b(), 60);
    }

    #[test]
    fn test_write_is_inverse_of_read() {
        let capture = load(COMPRESSED).unwrap();
        let mut out = Vec::new();
        SumpFile::write(&capture, &mut out).unwrap();

        assert_eq!(String::from_utf8(out.clone()).unwrap(), COMPRESSED);
        assert_eq!(load(std::str::from_utf8(&out).unwrap()).unwrap(), capture);
    }

    #[test]
    fn test_save_round_trip_without_rate_or_trigger() {
        let header = CaptureHeader {
            sample_rate: None,
            trigger_position: None,
            channels: 4,
            enabled_channels: 0x0F,
        };
        let capture = Capture::from_samples(header, &[3, 3, 1, 0, 0, 2]).unwrap();

        let mut out = Vec::new();
        SumpFile::write(&capture, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(";Rate: -1\n"));
        assert!(!text.contains("TriggerPosition"));

        let loaded = load(&text).unwrap();
        assert_eq!(loaded.values(), capture.values());
        assert_eq!(loaded.timestamps(), capture.timestamps());
        assert_eq!(loaded.header(), capture.header());
    }

    #[test]
    fn test_read_legacy_compresses_samples() {
        let text = ";Size: 6\n;Rate: 100\n;Channels: 8\n0001\n0001\n0003\n0003\n0001\n0001\n";
        let capture = load(text).unwrap();
        assert_eq!(capture.values(), &[1, 3, 1]);
        assert_eq!(capture.timestamps(), &[0, 2, 4]);
        assert_eq!(capture.absolute_length(), 6);
        assert_eq!(capture.trigger_position(), None);
    }

    #[test]
    fn test_read_legacy_wide_words() {
        let text = ";Size: 2\n;Channels: 32\n00010000\nffffffff\n";
        let capture = load(text).unwrap();
        assert_eq!(capture.values(), &[0x0001_0000, 0xFFFF_FFFF]);
    }

    #[test]
    fn test_missing_size() {
        let text = ";Rate: 100\n0001\n";
        assert!(matches!(load(text), Err(SumpError::MissingField(f)) if f == "Size"));
    }

    #[test]
    fn test_missing_absolute_length() {
        let text = ";Size: 1\n;Compressed: true\n00000000@0\n";
        assert!(matches!(load(text), Err(SumpError::MissingField(f)) if f == "AbsoluteLength"));
    }

    #[test]
    fn test_header_only_file_is_corrupt() {
        assert!(matches!(
            load(";Size: 4\n;Rate: 100\n"),
            Err(SumpError::ParseHeader(_))
        ));
        assert!(matches!(load(""), Err(SumpError::ParseHeader(_))));
    }

    #[test]
    fn test_malformed_header_values() {
        assert!(matches!(
            load(";Size: many\n0001\n"),
            Err(SumpError::ParseHeader(_))
        ));
        assert!(matches!(
            load(";Size: 1\n;CursorA: left\n0001\n"),
            Err(SumpError::ParseHeader(_))
        ));
        assert!(matches!(
            load(";Size: 1\n;Compressed: maybe\n0001\n"),
            Err(SumpError::ParseHeader(_))
        ));
        assert!(matches!(
            load(";Size: 1\n;Channels: 40\n0001\n"),
            Err(SumpError::ParseHeader(_))
        ));
    }

    #[test]
    fn test_size_out_of_bounds() {
        assert!(matches!(
            load(";Size: 0\n0001\n"),
            Err(SumpError::InvalidSize(_))
        ));
        assert!(matches!(
            load(";Size: 300000\n0001\n"),
            Err(SumpError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_undecodable_payload() {
        let bad_hex = ";Size: 2\n;Channels: 8\n0001\nzz01\n";
        assert!(matches!(
            load(bad_hex),
            Err(SumpError::InvalidData { line: 4, .. })
        ));

        let bad_timestamp =
            ";Size: 2\n;Compressed: true\n;AbsoluteLength: 10\n00000000@0\n00000001@x\n";
        assert!(matches!(
            load(bad_timestamp),
            Err(SumpError::InvalidData { line: 5, .. })
        ));

        let no_at = ";Size: 1\n;Compressed: true\n;AbsoluteLength: 10\n00000000\n";
        assert!(matches!(load(no_at), Err(SumpError::InvalidData { .. })));
    }

    #[test]
    fn test_trailing_garbage_in_words() {
        let compressed =
            ";Size: 2\n;Compressed: true\n;AbsoluteLength: 10\n00000000@0\n00000001zz@5\n";
        assert!(matches!(
            load(compressed),
            Err(SumpError::InvalidData { line: 5, .. })
        ));

        let legacy = ";Size: 2\n;Channels: 8\n0001\n0001xyz\n";
        assert!(matches!(
            load(legacy),
            Err(SumpError::InvalidData { line: 4, .. })
        ));

        let short = ";Size: 1\n;Channels: 32\n0001\n";
        assert!(matches!(load(short), Err(SumpError::InvalidData { .. })));
    }

    #[test]
    fn test_absolute_length_may_equal_last_transition() {
        let text = ";Size: 2\n;Rate: 1000\n;Channels: 32\n;Compressed: true\n;AbsoluteLength: 40\n00000000@0\n00000001@40\n";
        let capture = load(text).unwrap();
        assert_eq!(capture.timestamps(), &[0, 40]);
        assert_eq!(capture.absolute_length(), 40);
    }

    #[test]
    fn test_oversized_header_fails_as_truncated() {
        let text = ";Size: 268435456\n;Compressed: true\n;AbsoluteLength: 10\n00000000@0\n";
        assert!(matches!(load(text), Err(SumpError::InvalidData { .. })));
    }

    #[test]
    fn test_truncated_data() {
        let text = ";Size: 3\n;Channels: 8\n0001\n0002\n";
        assert!(matches!(load(text), Err(SumpError::InvalidData { .. })));
    }

    #[test]
    fn test_out_of_range_cursors_are_clamped() {
        let text = ";Size: 4\n;Channels: 8\n;CursorA: -3\n;CursorB: 99\n0001\n0001\n0002\n0002\n";
        let capture = load(text).unwrap();
        assert_eq!(capture.cursor_a(), 0);
        assert_eq!(capture.cursor_b(), 3);
    }

    #[test]
    fn test_compressed_data_must_satisfy_invariants() {
        let text = ";Size: 2\n;Compressed: true\n;AbsoluteLength: 10\n00000000@0\n00000000@4\n";
        assert!(matches!(load(text), Err(SumpError::InvalidCapture(_))));
    }
}
