// src/utils/log.rs

//! Formatting helpers for run-level log output.
//!
//! Everything goes through the `log` facade; the binary decides where it ends up.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Log a header block.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {title}");
    for (key, value) in items {
        sub_item(&format!("{key}: {value}"));
    }
}

/// Log sink that writes every line to stderr and appends it to a file.
pub struct LogTee {
    file: File,
}

impl LogTee {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl Write for LogTee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tee_appends_to_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("adb_workflow.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let mut tee = LogTee::open(&path).unwrap();
        writeln!(tee, "run started").unwrap();
        tee.flush().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier\nrun started\n"
        );
    }
}
