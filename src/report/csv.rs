use super::{Cell, Report};
use std::io::{self, Write};

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Value(value) => value.to_string(),
        Cell::Event(label) => label.clone(),
    }
}

/// Write the report as comma separated values with every field quoted
pub fn write_csv<W: Write>(report: &Report<'_>, writer: &mut W) -> io::Result<()> {
    let (primary, secondary) = report.columns();
    let header = [
        "index".to_string(),
        "time".to_string(),
        format!("{} data or event", primary),
        format!("{} data or event", secondary),
    ];
    writeln!(writer, "{}", header.map(|h| quote(&h)).join(","))?;

    for row in report.rows() {
        writeln!(
            writer,
            "{},{},{},{}",
            quote(&row.index.to_string()),
            quote(&row.time),
            quote(&cell_text(&row.primary)),
            quote(&cell_text(&row.secondary))
        )?;
    }
    writer.flush()
}
