//! YAML/JSON schema for declarative callback configuration

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::callback::MonitorMode;
use crate::error::{HookError, Result};

/// Deserialize a bool from either a YAML boolean (`true`) or a quoted string (`"true"`).
fn deserialize_bool_lenient<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

fn default_true() -> bool {
    true
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Complete callback configuration for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksSpec {
    /// Run directory receiving every artifact
    pub output_dir: PathBuf,

    /// Train even if the run directory is marked finished
    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub force_train: bool,

    /// Experiment configuration, copied verbatim to `config.json`
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,

    /// File copied into the run directory (defaults to the current executable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<PathBuf>,

    /// Record run metadata and honour the `FINISHED` sentinel
    #[serde(default = "default_true", deserialize_with = "deserialize_bool_lenient")]
    pub meta: bool,

    /// `(epoch_threshold, rate)` pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_schedule: Option<Vec<(usize, f32)>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistorySpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summaries: Option<SummarySpec>,
}

/// History settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySpec {
    /// Record batch logs every K examples (disabled when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_every_k_examples: Option<u64>,
}

/// Checkpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSpec {
    /// Weights file, relative to `output_dir` unless absolute
    #[serde(default = "default_checkpoint_filename")]
    pub filename: PathBuf,

    /// Metric to monitor
    #[serde(default = "default_monitor")]
    pub monitor: String,

    /// "min" | "max" | "auto"; anything else is treated as "auto"
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub save_best_only: bool,

    /// Evaluate every N epochs
    #[serde(default = "default_period")]
    pub period: usize,

    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub verbose: bool,
}

impl Default for CheckpointSpec {
    fn default() -> Self {
        Self {
            filename: default_checkpoint_filename(),
            monitor: default_monitor(),
            mode: default_mode(),
            save_best_only: false,
            period: default_period(),
            verbose: false,
        }
    }
}

impl CheckpointSpec {
    /// Parsed comparison mode
    pub fn monitor_mode(&self) -> MonitorMode {
        self.mode.parse().unwrap_or_default()
    }
}

fn default_checkpoint_filename() -> PathBuf {
    PathBuf::from("model_best.json")
}

fn default_monitor() -> String {
    "val_loss".to_string()
}

fn default_mode() -> String {
    "auto".to_string()
}

fn default_period() -> usize {
    1
}

/// Scalar summary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySpec {
    /// Seconds between buffered flushes
    #[serde(default = "default_flush_secs")]
    pub flush_secs: u64,
}

impl Default for SummarySpec {
    fn default() -> Self {
        Self { flush_secs: default_flush_secs() }
    }
}

fn default_flush_secs() -> u64 {
    10
}

impl HooksSpec {
    /// Minimal spec: metadata only, writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            force_train: false,
            config: empty_object(),
            entry_point: None,
            meta: true,
            lr_schedule: None,
            history: None,
            checkpoint: None,
            summaries: None,
        }
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let spec: HooksSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load from a `.json` file, or YAML for any other extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| HookError::ConfigParsing {
            path: path.to_path_buf(),
            message: format!("failed to read file: {e}"),
        })?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed: std::result::Result<HooksSpec, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        let spec = parsed
            .map_err(|message| HookError::ConfigParsing { path: path.to_path_buf(), message })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check value ranges before any callback is built
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(HookError::config(
                "output_dir",
                "must not be empty",
                "Set output_dir to the run directory",
            ));
        }
        if let Some(schedule) = &self.lr_schedule {
            crate::callback::LRSchedule::rates(schedule.clone())?;
        }
        if let Some(checkpoint) = &self.checkpoint {
            if checkpoint.period == 0 {
                return Err(HookError::config(
                    "checkpoint.period",
                    "period must be at least 1",
                    "Use period: 1 to checkpoint every epoch",
                ));
            }
            if checkpoint.monitor.is_empty() {
                return Err(HookError::config(
                    "checkpoint.monitor",
                    "monitor must name a metric",
                    "Use e.g. monitor: val_loss",
                ));
            }
        }
        if let Some(summaries) = &self.summaries {
            if summaries.flush_secs == 0 {
                log::debug!("summaries.flush_secs is 0, every scalar will be flushed");
            }
        }
        Ok(())
    }

    /// Absolute or run-relative checkpoint path
    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        self.checkpoint.as_ref().map(|c| {
            if c.filename.is_absolute() {
                c.filename.clone()
            } else {
                self.output_dir.join(&c.filename)
            }
        })
    }
}
