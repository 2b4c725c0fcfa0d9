//! Output formatting for command results.
//!
//! Results are rendered as a table (default), as JSON, or, with
//! `--print-proto`, as protobuf text format.

use std::io::Write;

use prost::{Message, Name};
use serde::{Serialize, Serializer};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter selected by `--format` and `--print-proto`.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormat {
    format: Format,
    print_proto: bool,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format, print_proto: bool) -> Self {
        Self {
            format,
            print_proto,
        }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Check if raw responses should be printed as protobuf text.
    #[must_use]
    pub const fn print_proto(&self) -> bool {
        self.print_proto
    }

    /// Write a report to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)?;
                writeln!(writer)?;
            }
            Format::Text => value.write_table(writer)?,
        }
        Ok(())
    }

    /// Write a report to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Text, false)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// A per-target result that renders as zero or more table rows.
pub trait TargetRows: Serialize {
    /// Column headers, excluding the leading target column.
    const HEADERS: &'static [&'static str];

    /// Whether rows of one target are sorted; off for ordered output.
    const SORTED: bool = true;

    /// Rows for this target, one cell per header.
    fn rows(&self) -> Vec<Vec<String>>;
}

/// Results of one command across targets.
///
/// Serializes as an array with one object per target, the target name in
/// a `target` field next to the result's own fields.
#[derive(Debug, Clone)]
pub struct Report<T> {
    entries: Vec<(String, T)>,
}

impl<T> Report<T> {
    /// Builds a report, sorting entries by target name.
    #[must_use]
    pub fn new(mut entries: Vec<(String, T)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    /// Returns the entries.
    #[must_use]
    pub fn entries(&self) -> &[(String, T)] {
        &self.entries
    }

    /// Returns true when no target produced a result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Serialize)]
struct Entry<'a, T> {
    target: &'a str,
    #[serde(flatten)]
    result: &'a T,
}

impl<T: Serialize> Serialize for Report<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter().map(|(target, result)| Entry {
            target,
            result,
        }))
    }
}

impl<T: TargetRows> TableDisplay for Report<T> {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let mut table = Table::new(
            std::iter::once("Target")
                .chain(T::HEADERS.iter().copied())
                .collect(),
        );
        for (target, result) in &self.entries {
            let mut rows = result.rows();
            if T::SORTED {
                rows.sort();
            }
            for row in rows {
                table.push(std::iter::once(target.clone()).chain(row).collect());
            }
        }
        table.write(writer)
    }
}

/// Fixed-width table with a `─` rule under the header.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(headers: Vec<&str>) -> Self {
        Self {
            headers: headers.into_iter().map(str::to_string).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Writes the table; nothing is written when it has no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = cell.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }

        write_line(writer, &self.headers, &widths)?;
        let rule = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(writer, "{}", "─".repeat(rule))?;
        for row in &self.rows {
            write_line(writer, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line<W: Write>(writer: &mut W, cells: &[String], widths: &[usize]) -> Result<(), CliError> {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(writer, "{}", line.trim_end())?;
    Ok(())
}

/// Prints `message` as protobuf text under the stdout lock, headed by the
/// target name.
///
/// # Errors
///
/// Returns an error if the message cannot be rendered or written.
pub fn print_proto<M: Message + Name>(target: &str, message: &M) -> Result<(), CliError> {
    let text = gnoic_proto::to_prototext(message)?;
    let mut stdout = std::io::stdout().lock();
    write_proto(&mut stdout, target, &text)
}

fn write_proto<W: Write>(writer: &mut W, target: &str, text: &str) -> Result<(), CliError> {
    writeln!(writer, "# {target}")?;
    writeln!(writer, "{}", text.trim_end())?;
    writer.flush()?;
    Ok(())
}

/// Formats Unix nanoseconds as RFC 3339.
#[must_use]
pub fn rfc3339_nanos(nanos: i64) -> String {
    chrono::DateTime::from_timestamp_nanos(nanos).to_rfc3339()
}

/// Formats a byte count with binary units.
#[must_use]
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Uptime {
        uptime: String,
        versions: Vec<String>,
    }

    impl TargetRows for Uptime {
        const HEADERS: &'static [&'static str] = &["Uptime", "Version"];

        fn rows(&self) -> Vec<Vec<String>> {
            self.versions
                .iter()
                .map(|v| vec![self.uptime.clone(), v.clone()])
                .collect()
        }
    }

    fn report() -> Report<Uptime> {
        Report::new(vec![
            (
                "r2".into(),
                Uptime {
                    uptime: "5d".into(),
                    versions: vec!["b".into(), "a".into()],
                },
            ),
            (
                "r1".into(),
                Uptime {
                    uptime: "12d".into(),
                    versions: vec!["a".into()],
                },
            ),
        ])
    }

    #[test]
    fn table_sorted_by_target_then_row() {
        let out = OutputFormat::default().to_string(&report()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Target  Uptime  Version");
        assert_eq!(lines[1], "─".repeat(23));
        assert_eq!(lines[2], "r1      12d     a");
        assert_eq!(lines[3], "r2      5d      a");
        assert_eq!(lines[4], "r2      5d      b");
    }

    #[test]
    fn json_is_one_object_per_target() {
        let out = OutputFormat::new(Format::Json, false)
            .to_string(&report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["target"], "r1");
        assert_eq!(entries[0]["uptime"], "12d");
        assert_eq!(entries[1]["versions"][1], "a");
    }

    #[test]
    fn empty_table_writes_nothing() {
        let empty: Report<Uptime> = Report::new(vec![]);
        assert!(OutputFormat::default().to_string(&empty).unwrap().is_empty());
    }

    #[test]
    fn proto_block_has_target_header() {
        let mut buf = Vec::new();
        write_proto(&mut buf, "r1", "time: 1\n").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "# r1\ntime: 1\n");
    }

    #[test]
    fn bytes_humanized() {
        assert_eq!(humanize_bytes(512), "512 B");
        assert_eq!(humanize_bytes(2048), "2.0 KiB");
        assert_eq!(humanize_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn rfc3339_of_epoch() {
        assert_eq!(rfc3339_nanos(0), "1970-01-01T00:00:00+00:00");
    }
}
