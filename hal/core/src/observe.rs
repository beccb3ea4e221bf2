//! Line-oriented observation sinks (page-fault log, console output).

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

pub trait LineSink: Send {
    fn emit_line(&mut self, line: &str) -> io::Result<()>;
}

/// Appends to a file shared by every clone, one `writeln!` per line.
#[derive(Clone)]
pub struct FileSink {
    file: Arc<Mutex<File>>,
}

impl FileSink {
    pub fn append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl LineSink for FileSink {
    fn emit_line(&mut self, line: &str) -> io::Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "{line}")
    }
}

/// In-memory line buffer; clones share storage.
#[derive(Clone, Default)]
pub struct SharedLines {
    lines: Arc<Mutex<Vec<String>>>,
}

impl SharedLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl LineSink for SharedLines {
    fn emit_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

/// Writes each line to an `io::Write` and flushes, e.g. the process stdout.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> LineSink for WriterSink<W> {
    fn emit_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LineSink for NullSink {
    fn emit_line(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_lines_clones_see_each_other() {
        let lines = SharedLines::new();
        let mut writer = lines.clone();
        writer.emit_line("a").unwrap();
        writer.emit_line("b").unwrap();
        assert_eq!(lines.snapshot(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn writer_sink_terminates_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.emit_line("7").unwrap();
        sink.emit_line("inf").unwrap();
        assert_eq!(sink.writer, b"7\ninf\n");
    }

    #[test]
    fn file_sink_appends() {
        let path = std::env::temp_dir().join(format!("hal_file_sink_{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let mut sink = FileSink::append(&path).unwrap();
            sink.emit_line("first").unwrap();
        }
        {
            let mut sink = FileSink::append(&path).unwrap();
            sink.emit_line("second").unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(text, "first\nsecond\n");
    }
}
