//! Append-only record sinks for per-case results and critical failures.
//!
//! Each record is one JSON line. The file sink opens the log in append mode,
//! writes the whole line with a single `write_all` and closes it again, so a
//! crash never leaves a half-written record behind a buffered handle.

use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{HarnessError, Result};

pub trait LogSink: Send + Sync {
    fn append(&self, record: &Value) -> Result<()>;
}

/// JSONL file, opened per write.
#[derive(Debug, Clone)]
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sink_error(&self, e: impl std::fmt::Display) -> HarnessError {
        HarnessError::Sink {
            target: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

impl LogSink for JsonlFileSink {
    fn append(&self, record: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.sink_error(e))?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.sink_error(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.sink_error(e))?;
        Ok(())
    }
}

/// Keeps records in memory. Used by tests and by callers that only want the
/// final report.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Value>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Value> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn append(&self, record: &Value) -> Result<()> {
        let mut records = self.records.lock().map_err(|e| HarnessError::Sink {
            target: "memory".to_string(),
            message: e.to_string(),
        })?;
        records.push(record.clone());
        Ok(())
    }
}
