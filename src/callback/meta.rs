//! Run metadata capture and the `FINISHED` sentinel

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::traits::{RunContext, TrainStart, TrainerCallback};
use crate::error::{HookError, Result};
use crate::io::{touch, write_json_atomic};
use crate::logs::Logs;

/// Sentinel marking a completed run
pub const FINISHED_FILE: &str = "FINISHED";

/// Run configuration document
pub const CONFIG_FILE: &str = "config.json";

/// Run metadata document
pub const META_FILE: &str = "meta.json";

/// Provenance of a training run, written to `meta.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// Command line that started the run
    pub cmd: String,
    pub save_path: PathBuf,
    /// UTC date the run started, `%Y_%m_%d`
    pub start_utc_date: String,
    /// Seconds spent training. Holds `-start` while running and is completed
    /// to `end - start` at train end.
    pub execution_time: f64,
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Records run provenance and refuses to retrain a finished run.
///
/// At train begin, if `FINISHED` exists in the output directory and
/// `force_train` is off, the callback returns [`TrainStart::AlreadyFinished`]
/// without touching anything. Otherwise it copies the entry-point file into
/// the directory and writes `config.json` and `meta.json`. At train end it
/// completes the execution time, rewrites `meta.json` and creates `FINISHED`.
pub struct MetaSaver {
    save_path: PathBuf,
    force_train: bool,
    config: serde_json::Value,
    entry_point: Option<PathBuf>,
    meta: Option<RunMeta>,
}

impl MetaSaver {
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            force_train: false,
            config: serde_json::Value::Object(serde_json::Map::new()),
            entry_point: None,
            meta: None,
        }
    }

    /// Train even if the run is marked finished
    pub fn force_train(mut self, force: bool) -> Self {
        self.force_train = force;
        self
    }

    /// Configuration document written to `config.json`
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// File copied into the run directory (defaults to the current executable)
    pub fn entry_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry_point = Some(path.into());
        self
    }

    /// Metadata of the current run, once started
    pub fn meta(&self) -> Option<&RunMeta> {
        self.meta.as_ref()
    }

    /// Whether the run directory carries the `FINISHED` sentinel
    pub fn is_finished(&self) -> bool {
        self.save_path.join(FINISHED_FILE).exists()
    }

    fn copy_entry_point(&self) -> Result<()> {
        let source = match &self.entry_point {
            Some(path) => path.clone(),
            None => std::env::current_exe()
                .map_err(|e| HookError::io("locating the current executable", e))?,
        };
        let file_name = source.file_name().ok_or_else(|| {
            HookError::config(
                "entry_point",
                format!("{} has no file name", source.display()),
                "Point entry_point at a file",
            )
        })?;
        let target = self.save_path.join(file_name);
        fs::copy(&source, &target).map_err(|e| {
            HookError::io(
                format!("Failed to copy source {} to {}", source.display(), target.display()),
                e,
            )
        })?;
        Ok(())
    }

    fn write_meta(path: &Path, meta: &RunMeta) -> Result<()> {
        write_json_atomic(path.join(META_FILE), meta)
    }
}

impl TrainerCallback for MetaSaver {
    fn on_train_begin(&mut self, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<TrainStart> {
        if self.is_finished() && !self.force_train {
            log::info!(
                "Finished training. Exiting. Remove {} if you want to train anyways.",
                self.save_path.join(FINISHED_FILE).display()
            );
            return Ok(TrainStart::AlreadyFinished);
        }

        fs::create_dir_all(&self.save_path)
            .map_err(|e| HookError::io(format!("creating {}", self.save_path.display()), e))?;
        self.copy_entry_point()?;

        let cmd = std::env::args_os()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        let meta = RunMeta {
            cmd,
            save_path: self.save_path.clone(),
            start_utc_date: Utc::now().format("%Y_%m_%d").to_string(),
            execution_time: -now_secs(),
        };

        write_json_atomic(self.save_path.join(CONFIG_FILE), &self.config)?;
        Self::write_meta(&self.save_path, &meta)?;
        self.meta = Some(meta);
        Ok(TrainStart::Ready)
    }

    fn on_train_end(&mut self, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        let meta = self.meta.as_mut().ok_or(HookError::NotStarted { callback: "MetaSaver" })?;
        meta.execution_time += now_secs();
        Self::write_meta(&self.save_path, meta)?;
        touch(self.save_path.join(FINISHED_FILE))
    }

    fn name(&self) -> &'static str {
        "MetaSaver"
    }
}
