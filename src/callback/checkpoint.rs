//! Checkpoint callback for saving model and optimizer state

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::traits::{RunContext, TrainerCallback};
use crate::error::{HookError, Result};
use crate::io::save_weights;
use crate::logs::Logs;
use crate::model::{SharedModel, SharedOptimizer};

/// How the monitored metric is compared
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Lower is better
    Min,
    /// Higher is better
    Max,
    /// Infer from the metric name
    #[default]
    Auto,
}

impl MonitorMode {
    /// Resolve `Auto` to a concrete direction.
    ///
    /// Names containing `acc` or starting with `fmeasure` are maximized,
    /// everything else minimized. This is a plain substring match, so a
    /// loss named e.g. `inaccuracy` is treated as higher-is-better.
    pub fn resolve(self, monitor: &str) -> MonitorMode {
        match self {
            MonitorMode::Auto if monitor.contains("acc") || monitor.starts_with("fmeasure") => {
                MonitorMode::Max
            }
            MonitorMode::Auto => MonitorMode::Min,
            mode => mode,
        }
    }
}

impl FromStr for MonitorMode {
    type Err = std::convert::Infallible;

    /// Unknown strings fall back to `Auto`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "min" => MonitorMode::Min,
            "max" => MonitorMode::Max,
            other => {
                if other != "auto" {
                    log::warn!("Unknown checkpoint mode '{s}', falling back to auto");
                }
                MonitorMode::Auto
            }
        })
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MonitorMode::Min => "min",
            MonitorMode::Max => "max",
            MonitorMode::Auto => "auto",
        })
    }
}

/// Saves model and optimizer state every `period` epochs, optionally only
/// when the monitored metric improves.
///
/// The callback's own bookkeeping is serde-serializable so it can be
/// persisted alongside the run; live model/optimizer handles are skipped and
/// must be reattached with [`ModelCheckpoint::bind`] after restoring.
///
/// # Example
///
/// ```
/// use entrenar_hooks::callback::{ModelCheckpoint, MonitorMode};
///
/// let cb = ModelCheckpoint::new("runs/model_best.json")
///     .monitor("val_acc")
///     .save_best_only(true);
/// assert_eq!(cb.mode(), MonitorMode::Max);
/// assert_eq!(cb.best(), f64::NEG_INFINITY);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    filepath: PathBuf,
    monitor: String,
    requested_mode: MonitorMode,
    mode: MonitorMode,
    /// Best value so far; `None` stands for the initial ±infinity
    #[serde(default, with = "crate::logs::non_finite::option")]
    best: Option<f64>,
    period: usize,
    pub(crate) epochs_since_last_save: usize,
    save_best_only: bool,
    verbose: bool,
    #[serde(skip)]
    saves: usize,
    #[serde(skip)]
    model: Option<SharedModel>,
    #[serde(skip)]
    optimizer: Option<SharedOptimizer>,
}

impl ModelCheckpoint {
    /// Checkpoint to `filepath` every epoch, monitoring `val_loss`
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        let monitor = "val_loss".to_string();
        Self {
            filepath: filepath.into(),
            mode: MonitorMode::Auto.resolve(&monitor),
            monitor,
            requested_mode: MonitorMode::Auto,
            best: None,
            period: 1,
            epochs_since_last_save: 0,
            save_best_only: false,
            verbose: false,
            saves: 0,
            model: None,
            optimizer: None,
        }
    }

    /// Metric to monitor
    pub fn monitor(mut self, monitor: impl Into<String>) -> Self {
        self.monitor = monitor.into();
        self.mode = self.requested_mode.resolve(&self.monitor);
        self
    }

    /// Comparison mode
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Configure the comparison mode
    pub fn with_mode(mut self, mode: MonitorMode) -> Self {
        self.requested_mode = mode;
        self.mode = mode.resolve(&self.monitor);
        self
    }

    /// Only save when the monitored metric improves
    pub fn save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    /// Evaluate every `period` epochs. Fails on zero.
    pub fn period(mut self, period: usize) -> Result<Self> {
        if period == 0 {
            return Err(HookError::config(
                "checkpoint.period",
                "period must be at least 1",
                "Use period: 1 to checkpoint every epoch",
            ));
        }
        self.period = period;
        Ok(self)
    }

    /// Report improvements and saves at info level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Attach the model and optimizer to snapshot
    pub fn bind(&mut self, model: SharedModel, optimizer: SharedOptimizer) {
        self.model = Some(model);
        self.optimizer = Some(optimizer);
    }

    /// Builder form of [`bind`](Self::bind)
    pub fn with_model(mut self, model: SharedModel, optimizer: SharedOptimizer) -> Self {
        self.bind(model, optimizer);
        self
    }

    pub fn is_bound(&self) -> bool {
        self.model.is_some() && self.optimizer.is_some()
    }

    /// Best monitored value so far (±infinity before the first improvement)
    pub fn best(&self) -> f64 {
        match (self.best, self.mode) {
            (Some(best), _) => best,
            (None, MonitorMode::Max) => f64::NEG_INFINITY,
            (None, _) => f64::INFINITY,
        }
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn monitor_name(&self) -> &str {
        &self.monitor
    }

    /// Epochs elapsed since the last evaluation
    pub fn epochs_since_last_save(&self) -> usize {
        self.epochs_since_last_save
    }

    /// Number of weight artifacts written by this instance
    pub fn saves(&self) -> usize {
        self.saves
    }

    fn improved(&self, current: f64) -> bool {
        match self.mode {
            MonitorMode::Max => current > self.best(),
            _ => current < self.best(),
        }
    }

    fn save(&mut self) -> Result<()> {
        let (Some(model), Some(optimizer)) = (&self.model, &self.optimizer) else {
            return Err(HookError::Unbound { callback: "ModelCheckpoint", what: "model/optimizer" });
        };
        save_weights(model, optimizer, &self.filepath)?;
        self.saves += 1;
        Ok(())
    }
}

impl fmt::Debug for ModelCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCheckpoint")
            .field("filepath", &self.filepath)
            .field("monitor", &self.monitor)
            .field("mode", &self.mode)
            .field("best", &self.best())
            .field("period", &self.period)
            .field("epochs_since_last_save", &self.epochs_since_last_save)
            .field("save_best_only", &self.save_best_only)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl TrainerCallback for ModelCheckpoint {
    fn on_epoch_end(&mut self, epoch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        self.epochs_since_last_save += 1;
        if self.epochs_since_last_save < self.period {
            return Ok(());
        }
        self.epochs_since_last_save = 0;

        if !self.save_best_only {
            if self.verbose {
                log::info!("Epoch {epoch:05}: saving model to {}", self.filepath.display());
            }
            return self.save();
        }

        let Some(current) = logs.get_f64(&self.monitor) else {
            log::warn!("Can save best model only with {} available, skipping.", self.monitor);
            return Ok(());
        };

        if self.improved(current) {
            if self.verbose {
                log::info!(
                    "Epoch {epoch:05}: {} improved from {:.5} to {current:.5}, saving model to {}",
                    self.monitor,
                    self.best(),
                    self.filepath.display()
                );
            }
            self.best = Some(current);
            self.save()
        } else {
            if self.verbose {
                log::info!("Epoch {epoch:05}: {} did not improve", self.monitor);
            }
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "ModelCheckpoint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_json;
    use crate::model::testing::shared;

    fn bound(path: &Path) -> ModelCheckpoint {
        let (model, optimizer) = shared(vec![1.0, 2.0], 1);
        ModelCheckpoint::new(path).with_model(model, optimizer)
    }

    fn run_epochs(cb: &mut ModelCheckpoint, values: &[f64]) -> Vec<usize> {
        let mut ctx = RunContext::default();
        let mut saved_on = Vec::new();
        for (i, value) in values.iter().enumerate() {
            let before = cb.saves();
            cb.on_epoch_end(i, &mut Logs::new().with("val_loss", *value), &mut ctx).unwrap();
            if cb.saves() > before {
                saved_on.push(i + 1);
            }
        }
        saved_on
    }

    #[test]
    fn test_auto_mode_resolution() {
        assert_eq!(MonitorMode::Auto.resolve("val_acc"), MonitorMode::Max);
        assert_eq!(MonitorMode::Auto.resolve("fmeasure_macro"), MonitorMode::Max);
        assert_eq!(MonitorMode::Auto.resolve("val_loss"), MonitorMode::Min);
        assert_eq!(MonitorMode::Auto.resolve("macro_fmeasure"), MonitorMode::Min);
        // substring heuristic, kept as-is
        assert_eq!(MonitorMode::Auto.resolve("inaccuracy"), MonitorMode::Max);
        assert_eq!(MonitorMode::Min.resolve("val_acc"), MonitorMode::Min);
    }

    #[test]
    fn test_mode_from_str_falls_back_to_auto() {
        assert_eq!("MIN".parse::<MonitorMode>().unwrap(), MonitorMode::Min);
        assert_eq!("max".parse::<MonitorMode>().unwrap(), MonitorMode::Max);
        assert_eq!("sideways".parse::<MonitorMode>().unwrap(), MonitorMode::Auto);
    }

    #[test]
    fn test_initial_best() {
        let cb = ModelCheckpoint::new("/tmp/w.json").with_mode(MonitorMode::Min);
        assert_eq!(cb.best(), f64::INFINITY);
        let cb = ModelCheckpoint::new("/tmp/w.json").with_mode(MonitorMode::Max);
        assert_eq!(cb.best(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_save_best_only_min_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = bound(&dir.path().join("best.json"))
            .with_mode(MonitorMode::Min)
            .save_best_only(true);

        let saved_on = run_epochs(&mut cb, &[5.0, 3.0, 4.0, 2.0]);
        assert_eq!(saved_on, vec![1, 2, 4]);
        assert_eq!(cb.best(), 2.0);
        assert!(cb.filepath().exists());
    }

    #[test]
    fn test_equal_value_is_not_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = bound(&dir.path().join("best.json")).save_best_only(true);
        assert_eq!(run_epochs(&mut cb, &[1.0, 1.0]), vec![1]);
    }

    #[test]
    fn test_save_every_period_regardless_of_metric() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = bound(&dir.path().join("w.json")).period(2).unwrap();

        let saved_on = run_epochs(&mut cb, &[1.0, 9.0, 0.5, 100.0, 3.0, 3.0]);
        assert_eq!(saved_on, vec![2, 4, 6]);
        assert_eq!(cb.best(), f64::INFINITY);
    }

    #[test]
    fn test_missing_monitor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = bound(&dir.path().join("w.json")).monitor("val_acc").save_best_only(true);
        cb.on_epoch_end(0, &mut Logs::new().with("loss", 0.1), &mut RunContext::default())
            .unwrap();
        assert_eq!(cb.saves(), 0);
        assert_eq!(cb.epochs_since_last_save(), 0);
    }

    #[test]
    fn test_non_numeric_monitor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = bound(&dir.path().join("w.json")).save_best_only(true);
        cb.on_epoch_end(0, &mut Logs::new().with("val_loss", "n/a"), &mut RunContext::default())
            .unwrap();
        assert_eq!(cb.saves(), 0);
    }

    #[test]
    fn test_unbound_save_is_error() {
        let mut cb = ModelCheckpoint::new("/tmp/never.json");
        let err = cb
            .on_epoch_end(0, &mut Logs::new().with("val_loss", 1.0), &mut RunContext::default())
            .unwrap_err();
        assert!(matches!(err, HookError::Unbound { .. }));
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(ModelCheckpoint::new("/tmp/w.json").period(0).is_err());
    }

    #[test]
    fn test_weights_artifact_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.json");
        let mut cb = bound(&path);
        run_epochs(&mut cb, &[1.0]);

        let artifact: serde_json::Value = load_json(&path).unwrap();
        assert_eq!(artifact["model"]["weights"][1], 2.0);
        assert!(artifact["optimizer"]["param_groups"].is_array());
    }

    #[test]
    fn test_state_round_trip_and_rebind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let mut cb = bound(&path).with_mode(MonitorMode::Min).save_best_only(true).period(2).unwrap();
        run_epochs(&mut cb, &[5.0, 3.0, 4.0]);
        assert_eq!(cb.best(), 3.0);
        assert_eq!(cb.epochs_since_last_save(), 1);

        let json = serde_json::to_string(&cb).unwrap();
        assert!(!json.contains("weights"));
        let mut restored: ModelCheckpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.best(), 3.0);
        assert_eq!(restored.epochs_since_last_save(), 1);
        assert_eq!(restored.mode(), MonitorMode::Min);
        assert!(!restored.is_bound());

        let (model, optimizer) = shared(vec![7.0], 1);
        restored.bind(model, optimizer);
        restored
            .on_epoch_end(3, &mut Logs::new().with("val_loss", 2.5), &mut RunContext::default())
            .unwrap();
        assert_eq!(restored.saves(), 1);
        assert_eq!(restored.best(), 2.5);

        let artifact: serde_json::Value = load_json(&path).unwrap();
        assert_eq!(artifact["model"]["weights"][0], 7.0);
    }

    #[test]
    fn test_round_trip_preserves_infinite_initial_best() {
        let cb = ModelCheckpoint::new("/tmp/w.json").with_mode(MonitorMode::Max);
        let restored: ModelCheckpoint =
            serde_json::from_str(&serde_json::to_string(&cb).unwrap()).unwrap();
        assert_eq!(restored.best(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_round_trip_preserves_infinite_observed_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = bound(&dir.path().join("best.json")).with_mode(MonitorMode::Min).save_best_only(true);
        let mut ctx = RunContext::default();
        cb.on_epoch_end(0, &mut Logs::new().with("val_loss", f64::NEG_INFINITY), &mut ctx).unwrap();
        assert_eq!(cb.best(), f64::NEG_INFINITY);

        let json = serde_json::to_string(&cb).unwrap();
        assert!(json.contains(r#""best":"-inf""#));
        let restored: ModelCheckpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.best(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_checkpoint_name() {
        assert_eq!(ModelCheckpoint::new("/tmp").name(), "ModelCheckpoint");
    }
}
