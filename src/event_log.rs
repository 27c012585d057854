//! The database's `LOG` file.
//!
//! Each record is one line, `"[Level] - message"`. Records are also forwarded
//! to the [`log`] facade at the matching level so they show up in whatever
//! logger the host application installed.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    /// Developer detail.
    Debug,
    /// Normal operation.
    Info,
    /// Something unexpected that the engine recovered from.
    Warn,
    /// An operation failed.
    Error,
    /// The database cannot continue.
    Fatal,
}

impl EventLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            EventLevel::Debug => log::Level::Debug,
            EventLevel::Info => log::Level::Info,
            EventLevel::Warn => log::Level::Warn,
            EventLevel::Error | EventLevel::Fatal => log::Level::Error,
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventLevel::Debug => "Debug",
            EventLevel::Info => "Info",
            EventLevel::Warn => "Warn",
            EventLevel::Error => "Error",
            EventLevel::Fatal => "Fatal",
        };
        f.write_str(name)
    }
}

/// Appends event records to the `LOG` file.
pub struct EventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl EventLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::file_io(format!("open {}: {}", path.display(), e)))?;
        Ok(Self { path, writer: Mutex::new(BufWriter::new(file)) })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and flushes it.
    pub fn log(&self, level: EventLevel, message: &str) -> Result<()> {
        log::log!(target: "tcdb::event", level.as_log_level(), "{}", message);
        let mut writer = self.writer.lock();
        writeln!(writer, "[{}] - {}", level, message)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::file_io(format!("append to {}: {}", self.path.display(), e)))
    }

    /// Records an info event; a failing log write is reported through the
    /// `log` facade only.
    pub fn info(&self, message: &str) {
        self.log_quietly(EventLevel::Info, message);
    }

    /// Records a warning.
    pub fn warn(&self, message: &str) {
        self.log_quietly(EventLevel::Warn, message);
    }

    /// Records an error.
    pub fn error(&self, message: &str) {
        self.log_quietly(EventLevel::Error, message);
    }

    fn log_quietly(&self, level: EventLevel, message: &str) {
        if let Err(e) = self.log(level, message) {
            log::error!("Event log unavailable: {}", e);
        }
    }
}
