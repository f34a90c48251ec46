use crate::error::Result;
use chrono::Local;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Plain-text audit log written by one smoothing stage.
///
/// The underlying writer is flushed by [`AuditReport::finish`], and a
/// buffered file is still flushed when the report is dropped early.
pub struct AuditReport<W: Write> {
    out: W,
    entries: usize,
}

impl AuditReport<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(AuditReport::new(BufWriter::new(file)))
    }
}

impl<W: Write> AuditReport<W> {
    pub fn new(out: W) -> Self {
        AuditReport { out, entries: 0 }
    }

    /// Writes a title stamped with the current local time, then the column line.
    pub fn header(&mut self, title: &str, columns: &str) -> Result<()> {
        writeln!(
            self.out,
            "{} ({}):",
            title,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(self.out, "{}", columns)?;
        Ok(())
    }

    pub fn entry(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.out.write_fmt(args)?;
        self.out.write_all(b"\n")?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written so far, headers excluded.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Raw access for appending a table after the entries.
    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_entries() {
        let mut report = AuditReport::new(Vec::new());
        report.header("Test report", "a,b").unwrap();
        report.entry(format_args!("{},{}", 1, 2.5)).unwrap();
        assert_eq!(report.entries(), 1);
        let text = String::from_utf8(report.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Test report ("));
        assert_eq!(lines[1], "a,b");
        assert_eq!(lines[2], "1,2.5");
    }
}
