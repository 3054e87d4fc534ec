use std::fmt::Display;
use std::io;

use anyhow::Result;
use serde::Serialize;

use super::command::OutputFormat;
use super::ui::Painter;

/// Writes command results as pretty views or JSON lines.
pub(crate) struct Printer {
    format: OutputFormat,
    painter: Painter,
}

impl Printer {
    pub(crate) fn new(format: OutputFormat, use_colour: bool) -> Self {
        Self {
            format,
            painter: Painter::new(use_colour && format == OutputFormat::Pretty),
        }
    }

    /// Prints `record` as one JSON line, or through `view` when pretty.
    pub(crate) fn print<'a, W, T, V>(
        &'a self,
        out: &mut W,
        record: &'a T,
        view: impl FnOnce(&'a T, &'a Painter) -> V,
    ) -> Result<()>
    where
        W: io::Write,
        T: Serialize,
        V: Display,
    {
        match self.format {
            OutputFormat::Pretty => writeln!(out, "{}", view(record, &self.painter))?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, record)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn json_output_writes_one_line_per_record() {
        let printer = Printer::new(OutputFormat::Json, true);
        let mut out = Vec::new();

        printer
            .print(&mut out, &json!({ "received": 2 }), |_record, _painter| "unused")
            .expect("json output should be written");
        printer
            .print(&mut out, &json!({ "received": 3 }), |_record, _painter| "unused")
            .expect("json output should be written");

        let rendered = String::from_utf8(out).expect("output should be UTF-8");
        assert_eq!("{\"received\":2}\n{\"received\":3}\n", rendered);
    }

    #[test]
    fn pretty_output_uses_the_view() {
        let printer = Printer::new(OutputFormat::Pretty, false);
        let mut out = Vec::new();

        printer
            .print(&mut out, &1_u8, |record, _painter| format!("value {record}"))
            .expect("pretty output should be written");

        assert_eq!("value 1\n", String::from_utf8(out).expect("output should be UTF-8"));
    }
}
