use super::{Cell, Report, ReportRow, hex_digits};
use chrono::{Local, NaiveDate};
use std::io::{self, Write};

/// Below this many samples per bit the baud estimate is unreliable
const MIN_RELIABLE_BIT_LENGTH: u64 = 15;

const STYLE: &str = "th { text-align:left; font-style:italic; font-weight:bold; \
                     font-size:medium; font-family:sans-serif; background-color:#C0C0FF; }";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Hex, binary, decimal and ASCII cells for one column
fn value_cells(cell: &Cell, bits: u8) -> [String; 4] {
    match cell {
        Cell::Empty => Default::default(),
        Cell::Event(label) => [escape(label), String::new(), String::new(), String::new()],
        Cell::Value(value) => {
            let ascii = match char::from_u32(*value) {
                Some(c) if bits == 8 && (' '..='~').contains(&c) => escape(&c.to_string()),
                _ => String::new(),
            };
            [
                format!("0x{:0width$X}", value, width = hex_digits(bits)),
                format!("0b{:0width$b}", value, width = usize::from(bits)),
                value.to_string(),
                ascii,
            ]
        }
    }
}

fn write_row<W: Write>(writer: &mut W, row: &ReportRow, bits: u8) -> io::Result<()> {
    let background = if row.is_event() { "#E0E0E0" } else { "#FFFFFF" };
    write!(
        writer,
        "<tr style=\"background-color:{};\"><td>{}</td><td>{}</td>",
        background,
        row.index,
        escape(&row.time)
    )?;
    for cell in [&row.primary, &row.secondary] {
        for text in value_cells(cell, bits) {
            write!(writer, "<td>{}</td>", text)?;
        }
    }
    writeln!(writer, "</tr>")
}

fn write_stats<W: Write>(report: &Report<'_>, writer: &mut W) -> io::Result<()> {
    let stats = &report.decoded.stats;
    writeln!(writer, "<table style=\"width:100%;\">")?;
    writeln!(
        writer,
        "<tr><td style=\"width:30%;\">Decoded Symbols</td><td>{}</td></tr>",
        stats.symbols
    )?;
    writeln!(
        writer,
        "<tr><td style=\"width:30%;\">Detected Bus Errors</td><td>{}</td></tr>",
        stats.errors
    )?;
    if let Some(baud) = stats.baud_rate(report.sample_rate) {
        writeln!(
            writer,
            "<tr><td style=\"width:30%;\">Baudrate</td><td>{}</td></tr>",
            baud
        )?;
    }
    writeln!(writer, "</table>")?;

    if stats.estimation_failed {
        writeln!(
            writer,
            "<p style=\"color:red;\">Baudrate calculation failed !</p>"
        )?;
    }
    if let Some(bit_length) = stats.bit_length
        && bit_length < MIN_RELIABLE_BIT_LENGTH
    {
        writeln!(
            writer,
            "<p style=\"color:red;\">The baudrate may be wrong, use a higher samplerate to avoid this !</p>"
        )?;
    }
    if stats.cancelled {
        writeln!(
            writer,
            "<p style=\"color:red;\">Decoding was cancelled, results are incomplete.</p>"
        )?;
    }
    Ok(())
}

/// Write the report as a self-contained HTML page dated today
pub fn write_html<W: Write>(report: &Report<'_>, writer: &mut W) -> io::Result<()> {
    write_html_dated(report, Local::now().date_naive(), writer)
}

pub(crate) fn write_html_dated<W: Write>(
    report: &Report<'_>,
    date: NaiveDate,
    writer: &mut W,
) -> io::Result<()> {
    let title = escape(&report.title());
    let (primary, secondary) = report.columns();
    let bits = report.decoded.word_bits;

    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html>")?;
    writeln!(writer, "<head>")?;
    writeln!(writer, "<meta charset=\"utf-8\">")?;
    writeln!(writer, "<title>{}</title>", title)?;
    writeln!(writer, "<style>{}</style>", STYLE)?;
    writeln!(writer, "</head>")?;
    writeln!(writer, "<body>")?;
    writeln!(writer, "<h2>{}</h2>", title)?;
    writeln!(writer, "<hr>")?;
    writeln!(
        writer,
        "<div style=\"text-align:right;font-size:x-small;\">{}</div>",
        date.format("%B %-d, %Y")
    )?;

    write_stats(report, writer)?;

    writeln!(
        writer,
        "<table style=\"font-family:monospace;width:100%;\">"
    )?;
    write!(writer, "<tr><th>Index</th><th>Time</th>")?;
    for column in [primary, secondary] {
        for kind in ["Hex", "Bin", "Dec", "ASCII"] {
            write!(writer, "<th>{} {}</th>", column, kind)?;
        }
    }
    writeln!(writer, "</tr>")?;

    for row in report.rows() {
        write_row(writer, &row, bits)?;
    }

    writeln!(writer, "</table>")?;
    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::uart_decoded;

    fn render(report: &Report<'_>) -> String {
        let mut out = Vec::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        write_html_dated(report, date, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_uart_page() {
        let decoded = uart_decoded();
        let html = render(&Report::new(&decoded, Some(1_000_000)));

        assert!(html.contains("<title>UART Analysis Results</title>"));
        assert!(html.contains("March 7, 2024"));
        assert!(html.contains("<td style=\"width:30%;\">Decoded Symbols</td><td>2</td>"));
        assert!(html.contains("<td style=\"width:30%;\">Detected Bus Errors</td><td>1</td>"));
        assert!(html.contains("<td style=\"width:30%;\">Baudrate</td><td>100000</td>"));
        // 10 samples per bit is below the reliable oversampling
        assert!(html.contains("The baudrate may be wrong"));
        assert!(!html.contains("calculation failed"));
        assert!(html.contains("<th>RxD Hex</th>"));
        assert!(html.contains(
            "<td>0x41</td><td>0b01000001</td><td>65</td><td>A</td><td></td><td></td><td></td><td></td>"
        ));
        assert!(html.contains("<td>0x3C</td><td>0b00111100</td><td>60</td><td>&lt;</td>"));
        assert!(html.contains("<td>FRAME_ERR</td>"));
    }

    #[test]
    fn test_failed_estimate() {
        let mut decoded = uart_decoded();
        decoded.stats.bit_length = None;
        decoded.stats.estimation_failed = true;
        let html = render(&Report::new(&decoded, Some(1_000_000)));

        assert!(html.contains("Baudrate calculation failed"));
        assert!(!html.contains("<td style=\"width:30%;\">Baudrate</td>"));
    }

    #[test]
    fn test_value_cells() {
        assert_eq!(
            value_cells(&Cell::Value(0x1F5), 9),
            [
                "0x1F5".to_string(),
                "0b111110101".to_string(),
                "501".to_string(),
                String::new()
            ]
        );
        assert_eq!(value_cells(&Cell::Value(0x07), 8)[3], "");
        assert_eq!(value_cells(&Cell::Empty, 8), <[String; 4]>::default());
    }
}
