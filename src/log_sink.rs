// src/log_sink.rs
//
// Copyright, 2025. Signal65 / Futurum Group.
//
//! Run-level log sink handed explicitly to the dispatcher and adapters.
//!
//! Every message goes through `tracing` at info level and, when a log file
//! is configured, is appended to that file as one line.  Clones share the
//! same file handle.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LogSink {
    path: Option<PathBuf>,
    file: Option<Arc<Mutex<File>>>,
}

impl LogSink {
    /// Sink that only emits `tracing` events.
    pub fn tracing_only() -> Self {
        Self::default()
    }

    /// Sink that also appends to `path` (created if missing).
    pub fn to_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Appending run log to file: {}", path.display());
        Ok(Self {
            path: Some(path),
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// Build the sink described by an optional log file path.
    pub fn open(log_file: Option<&Path>) -> std::io::Result<Self> {
        match log_file {
            Some(p) => Self::to_file(p),
            None => Ok(Self::tracing_only()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Emit one message.  File write failures are reported, never raised.
    pub fn print_log(&self, msg: &str) {
        info!("{}", msg);
        let Some(file) = &self.file else { return };
        match file.lock() {
            Ok(mut f) => {
                if let Err(e) = writeln!(f, "{}", msg) {
                    warn!("log sink write failed: {}", e);
                }
            }
            Err(_) => warn!("log sink lock poisoned; dropping message"),
        }
    }
}
