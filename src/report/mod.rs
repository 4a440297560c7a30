//! Tabular view of a decode result and its exports
//!
//! Both exports render the same rows: index, time since the start of the
//! decoded region, and one cell per report column (MOSI/MISO or RxD/TxD).

mod csv;
mod html;

pub use csv::write_csv;
pub use html::write_html;

use crate::decoders::{Decoded, DecodedEvent, LineRole};

/// Content of one data column in a report row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Value(u32),
    Event(String),
}

/// One row of the report table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub index: usize,
    pub time: String,
    pub primary: Cell,
    pub secondary: Cell,
}

impl ReportRow {
    /// Rows carrying only events are highlighted in the HTML export
    pub fn is_event(&self) -> bool {
        !matches!(self.primary, Cell::Value(_)) && !matches!(self.secondary, Cell::Value(_))
    }
}

/// Decode result plus the acquisition data needed to render it
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub decoded: &'a Decoded,
    pub sample_rate: Option<u32>,
}

impl<'a> Report<'a> {
    pub fn new(decoded: &'a Decoded, sample_rate: Option<u32>) -> Self {
        Self {
            decoded,
            sample_rate,
        }
    }

    /// Report page title
    pub fn title(&self) -> String {
        format!("{} Analysis Results", self.decoded.protocol.name())
    }

    /// Names of the primary and secondary columns
    pub fn columns(&self) -> (&'static str, &'static str) {
        let (primary, secondary) = self.decoded.protocol.columns();
        (primary.name(), secondary.name())
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        let (primary, secondary) = self.decoded.protocol.columns();
        self.decoded
            .events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let (p, s) = cells(event, primary, secondary);
                ReportRow {
                    index,
                    time: self.time(event.position()),
                    primary: p,
                    secondary: s,
                }
            })
            .collect()
    }

    fn time(&self, position: u64) -> String {
        format_time(
            position.saturating_sub(self.decoded.stats.start),
            self.sample_rate,
        )
    }
}

fn cells(event: &DecodedEvent, primary: LineRole, secondary: LineRole) -> (Cell, Cell) {
    let place = |line: LineRole, cell: Cell| {
        if line == primary {
            (cell, Cell::Empty)
        } else if line == secondary {
            (Cell::Empty, cell)
        } else {
            (cell.clone(), cell)
        }
    };

    match event {
        DecodedEvent::Transfer(t) => (Cell::Value(t.mosi), Cell::Value(t.miso)),
        DecodedEvent::Symbol(s) => place(s.line, Cell::Value(s.value)),
        DecodedEvent::Line(l) => place(l.line, Cell::Event(l.label())),
    }
}

/// Render a sample count as time.
///
/// With a known sample rate the value is scaled to ns/µs/ms/s with two
/// decimals; without one the raw sample count is returned.
pub fn format_time(samples: u64, sample_rate: Option<u32>) -> String {
    let Some(rate) = sample_rate.filter(|&rate| rate > 0) else {
        return samples.to_string();
    };
    let seconds = samples as f64 / f64::from(rate);
    if seconds < 1.0e-6 {
        format!("{:.2}ns", seconds * 1.0e9)
    } else if seconds < 1.0e-3 {
        format!("{:.2}µs", seconds * 1.0e6)
    } else if seconds < 1.0 {
        format!("{:.2}ms", seconds * 1.0e3)
    } else {
        format!("{:.2}s", seconds)
    }
}

/// Hex digits needed for a `bits` wide word
pub(crate) fn hex_digits(bits: u8) -> usize {
    usize::from(bits).div_ceil(4)
}
