//! Scalar summary export
//!
//! Numeric epoch metrics are appended to `summaries.jsonl` in the run
//! directory, one JSON record per scalar.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::traits::{RunContext, TrainerCallback};
use crate::error::{HookError, Result};
use crate::logs::Logs;

/// File name of the summary stream
pub const SUMMARY_FILE: &str = "summaries.jsonl";

/// One scalar record in the summary stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    pub tag: String,
    /// NaN and infinities are written as `"NaN"`, `"inf"` and `"-inf"`
    #[serde(with = "crate::logs::non_finite")]
    pub value: f64,
    pub step: u64,
    /// Seconds since the Unix epoch
    pub wall_time: f64,
}

/// Append-only writer for the summary stream.
///
/// Writes are buffered and flushed once `flush_interval` has elapsed since the
/// previous flush, on [`flush`](Self::flush), and on drop.
pub struct SummaryWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    flush_interval: Duration,
    last_flush: Instant,
}

impl SummaryWriter {
    /// Open (or create) the stream in `dir`
    pub fn open(dir: impl AsRef<Path>, flush_interval: Duration) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| HookError::io(format!("creating {}", dir.display()), e))?;
        let path = dir.join(SUMMARY_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| HookError::io(format!("opening {}", path.display()), e))?;
        Ok(Self { path, writer: BufWriter::new(file), flush_interval, last_flush: Instant::now() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a scalar
    pub fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        let wall_time = Utc::now().timestamp_millis() as f64 / 1000.0;
        let record = ScalarRecord { tag: tag.to_string(), value, step, wall_time };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| HookError::io(format!("writing {}", self.path.display()), e))?;

        if self.last_flush.elapsed() >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| HookError::io(format!("flushing {}", self.path.display()), e))?;
        self.last_flush = Instant::now();
        Ok(())
    }
}

impl Drop for SummaryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("failed to flush {}: {e}", self.path.display());
        }
    }
}

/// Exports every numeric epoch metric as a scalar tagged with the epoch index.
///
/// Values that do not coerce to a float (model names, phases, ...) are skipped.
/// The writer is opened lazily at the first epoch end.
pub struct ScalarSummaries {
    dir: PathBuf,
    flush_interval: Duration,
    writer: Option<SummaryWriter>,
}

impl ScalarSummaries {
    /// Write summaries into `dir`, flushing every 10 seconds
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), flush_interval: Duration::from_secs(10), writer: None }
    }

    /// Configure the flush interval
    pub fn flush_every(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    fn writer(&mut self) -> Result<&mut SummaryWriter> {
        if self.writer.is_none() {
            self.writer = Some(SummaryWriter::open(&self.dir, self.flush_interval)?);
        }
        self.writer
            .as_mut()
            .ok_or(HookError::Unbound { callback: "ScalarSummaries", what: "summary writer" })
    }
}

impl TrainerCallback for ScalarSummaries {
    fn on_epoch_end(&mut self, epoch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        let writer = self.writer()?;
        for (tag, value) in logs.iter() {
            if let Some(v) = value.as_f64() {
                writer.add_scalar(tag, v, epoch as u64)?;
            }
        }
        Ok(())
    }

    fn on_train_end(&mut self, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        match &mut self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "ScalarSummaries"
    }
}
