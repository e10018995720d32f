//! JSON-lines audit log writer with size-based rotation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::{AuditSink, DecisionRecord};
use crate::config::AuditSettings;

struct WriterState {
    writer: BufWriter<File>,
    log_path: PathBuf,
    max_size_bytes: u64,
    max_files: u32,
}

impl WriterState {
    fn write_record(&mut self, record: &DecisionRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;

        if let Ok(meta) = fs::metadata(&self.log_path) {
            if meta.len() >= self.max_size_bytes {
                self.rotate()?;
            }
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        let max = self.max_files;
        if max == 0 {
            return Ok(());
        }

        let oldest = rotated_path(&self.log_path, max);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift .N -> .N+1, highest first to avoid overwrites.
        for i in (1..max).rev() {
            let from = rotated_path(&self.log_path, i);
            let to = rotated_path(&self.log_path, i + 1);
            if from.exists() {
                fs::rename(&from, &to)?;
            }
        }

        if self.log_path.exists() {
            fs::rename(&self.log_path, rotated_path(&self.log_path, 1))?;
        }

        let fresh = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        self.writer = BufWriter::new(fresh);
        Ok(())
    }
}

fn rotated_path(log_path: &Path, index: u32) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// File-backed audit sink writing one JSON record per line.
pub struct JsonLinesAudit {
    state: Mutex<WriterState>,
}

impl JsonLinesAudit {
    /// Open (or create) the audit log described by `settings`.
    pub fn open(settings: &AuditSettings) -> Result<Self> {
        if let Some(parent) = settings.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create audit log directory: {}", parent.display())
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.log_path)
            .with_context(|| {
                format!("failed to open audit log: {}", settings.log_path.display())
            })?;

        Ok(Self {
            state: Mutex::new(WriterState {
                writer: BufWriter::new(file),
                log_path: settings.log_path.clone(),
                max_size_bytes: settings.max_size_mb.max(1) * 1024 * 1024,
                max_files: settings.max_files,
            }),
        })
    }

    /// Read back all records in the current (non-rotated) log file.
    pub fn read_all(path: &Path) -> Result<Vec<DecisionRecord>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read audit log: {}", path.display()))?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

impl AuditSink for JsonLinesAudit {
    fn log(&self, record: &DecisionRecord) -> Result<()> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .write_record(record)
    }
}
