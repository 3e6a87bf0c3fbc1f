//! History callback recording per-epoch and periodic per-batch metrics

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::traits::{RunContext, TrainStart, TrainerCallback};
use crate::error::Result;
use crate::io::write_json_atomic;
use crate::logs::{Logs, MetricHistory, EXAMPLES_SEEN_KEY};

/// File name of the per-epoch history snapshot
pub const HISTORY_FILE: &str = "history.json";

/// File name of the per-batch history snapshot
pub const HISTORY_BATCH_FILE: &str = "history_batch.json";

/// Records every epoch's logs and, optionally, the batch logs every K examples.
///
/// With a save directory configured, both accumulators are snapshotted to
/// JSON at the end of every epoch.
///
/// Batch-level recording requires a `size` key in the batch logs. While it is
/// enabled the running example count is written back into the logs as
/// `examples_seen` and published on [`RunContext`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct History {
    save_every_k_examples: Option<u64>,
    save_dir: Option<PathBuf>,
    history: MetricHistory,
    history_batch: MetricHistory,
    examples_seen: u64,
    examples_seen_since_last_population: u64,
}

impl History {
    /// Per-epoch history only
    pub fn new() -> Self {
        Self {
            save_every_k_examples: None,
            save_dir: None,
            history: MetricHistory::new(),
            history_batch: MetricHistory::new(),
            examples_seen: 0,
            examples_seen_since_last_population: 0,
        }
    }

    /// Also record batch logs once more than `k` examples were seen since the last record
    pub fn every_k_examples(mut self, k: u64) -> Self {
        self.save_every_k_examples = Some(k);
        self
    }

    /// Snapshot histories into `dir` at every epoch end
    pub fn save_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    /// Per-epoch metric sequences
    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    /// Per-interval batch metric sequences
    pub fn history_batch(&self) -> &MetricHistory {
        &self.history_batch
    }

    /// Examples counted since training began
    pub fn examples_seen(&self) -> u64 {
        self.examples_seen
    }

    fn append(target: &mut MetricHistory, logs: &Logs) {
        for (key, value) in logs {
            target.entry(key.clone()).or_default().push(value.clone());
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(dir) = &self.save_dir else {
            return Ok(());
        };
        write_json_atomic(dir.join(HISTORY_FILE), &self.history)?;
        if self.save_every_k_examples.is_some() {
            write_json_atomic(dir.join(HISTORY_BATCH_FILE), &self.history_batch)?;
        }
        Ok(())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainerCallback for History {
    fn on_train_begin(&mut self, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<TrainStart> {
        self.history.clear();
        self.history_batch.clear();
        self.examples_seen = 0;
        self.examples_seen_since_last_population = 0;
        Ok(TrainStart::Ready)
    }

    fn on_epoch_end(&mut self, _epoch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        Self::append(&mut self.history, logs);
        self.persist()
    }

    fn on_batch_end(&mut self, _batch: usize, logs: &mut Logs, ctx: &mut RunContext) -> Result<()> {
        let Some(k) = self.save_every_k_examples else {
            return Ok(());
        };

        let size = logs.size(self.name())?;
        self.examples_seen += size;
        self.examples_seen_since_last_population += size;
        logs.insert(EXAMPLES_SEEN_KEY, self.examples_seen);
        ctx.examples_seen = Some(self.examples_seen);

        if self.examples_seen_since_last_population > k {
            Self::append(&mut self.history_batch, logs);
            self.examples_seen_since_last_population = 0;
            // extend the published copy row by row; a full copy only when nothing is published yet
            match &mut ctx.batch_history {
                Some(published) => Self::append(published, logs),
                None => ctx.batch_history = Some(self.history_batch.clone()),
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "History"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::io::load_json;
    use crate::logs::LogValue;

    fn batch_logs(size: i64) -> Logs {
        Logs::new().with("size", size).with("loss", 0.5)
    }

    #[test]
    fn test_history_accumulates_epochs_in_order() {
        let mut history = History::new();
        let mut ctx = RunContext::default();
        history.on_train_begin(&mut Logs::new(), &mut ctx).unwrap();

        for (epoch, loss) in [1.0, 0.5, 0.25].into_iter().enumerate() {
            history.on_epoch_end(epoch, &mut Logs::new().with("loss", loss), &mut ctx).unwrap();
        }

        let losses: Vec<f64> =
            history.history()["loss"].iter().filter_map(LogValue::as_f64).collect();
        assert_eq!(losses, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_history_new_keys_start_new_sequences() {
        let mut history = History::new();
        let mut ctx = RunContext::default();
        history.on_epoch_end(0, &mut Logs::new().with("loss", 1.0), &mut ctx).unwrap();
        history
            .on_epoch_end(1, &mut Logs::new().with("loss", 0.9).with("val_loss", 1.1), &mut ctx)
            .unwrap();
        assert_eq!(history.history()["loss"].len(), 2);
        assert_eq!(history.history()["val_loss"].len(), 1);
    }

    #[test]
    fn test_history_batch_disabled_ignores_missing_size() {
        let mut history = History::new();
        let mut ctx = RunContext::default();
        let mut logs = Logs::new().with("loss", 1.0);
        history.on_batch_end(1, &mut logs, &mut ctx).unwrap();
        assert!(!logs.contains_key(EXAMPLES_SEEN_KEY));
        assert!(ctx.examples_seen.is_none());
    }

    #[test]
    fn test_history_batch_requires_size() {
        let mut history = History::new().every_k_examples(10);
        let err = history
            .on_batch_end(1, &mut Logs::new().with("loss", 1.0), &mut RunContext::default())
            .unwrap_err();
        assert!(matches!(err, HookError::MissingLogKey { callback: "History", .. }));
    }

    #[test]
    fn test_history_batch_population_every_ceil_batches() {
        // 25 examples per batch, threshold 60: populated once 75 > 60, i.e. every 3rd batch
        let mut history = History::new().every_k_examples(60);
        let mut ctx = RunContext::default();
        history.on_train_begin(&mut Logs::new(), &mut ctx).unwrap();

        let mut populated_at = Vec::new();
        for batch in 1..=9 {
            let before = history.history_batch().get("loss").map_or(0, Vec::len);
            history.on_batch_end(batch, &mut batch_logs(25), &mut ctx).unwrap();
            let after = history.history_batch().get("loss").map_or(0, Vec::len);
            if after > before {
                populated_at.push(batch);
            }
        }

        assert_eq!(populated_at, vec![3, 6, 9]);
        assert_eq!(history.examples_seen(), 225);
        assert_eq!(history.examples_seen_since_last_population, 0);
    }

    #[test]
    fn test_history_writes_examples_seen_into_logs_and_context() {
        let mut history = History::new().every_k_examples(1000);
        let mut ctx = RunContext::default();
        let mut logs = batch_logs(32);
        history.on_batch_end(1, &mut logs, &mut ctx).unwrap();
        let mut logs = batch_logs(32);
        history.on_batch_end(2, &mut logs, &mut ctx).unwrap();

        assert_eq!(logs.get(EXAMPLES_SEEN_KEY), Some(&LogValue::Int(64)));
        assert_eq!(ctx.examples_seen, Some(64));
        assert!(ctx.batch_history.is_none());
    }

    #[test]
    fn test_history_publishes_batch_history() {
        let mut history = History::new().every_k_examples(5);
        let mut ctx = RunContext::default();
        history.on_batch_end(1, &mut batch_logs(10), &mut ctx).unwrap();

        let published = ctx.batch_history.as_ref().unwrap();
        assert_eq!(published, history.history_batch());
        assert_eq!(published[EXAMPLES_SEEN_KEY], vec![LogValue::Int(10)]);
    }

    #[test]
    fn test_history_published_batch_history_tracks_every_population() {
        let mut history = History::new().every_k_examples(15);
        let mut ctx = RunContext::default();
        history.on_train_begin(&mut Logs::new(), &mut ctx).unwrap();

        for batch in 1..=8 {
            history.on_batch_end(batch, &mut batch_logs(10), &mut ctx).unwrap();
            if let Some(published) = &ctx.batch_history {
                assert_eq!(published, history.history_batch());
            }
        }

        let published = ctx.batch_history.as_ref().unwrap();
        assert_eq!(
            published[EXAMPLES_SEEN_KEY],
            vec![LogValue::Int(20), LogValue::Int(40), LogValue::Int(60), LogValue::Int(80)]
        );
    }

    #[test]
    fn test_history_round_trips_diverged_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::new().save_to(dir.path());
        let mut ctx = RunContext::default();
        history.on_epoch_end(0, &mut Logs::new().with("loss", 0.5), &mut ctx).unwrap();
        history.on_epoch_end(1, &mut Logs::new().with("loss", f64::NAN), &mut ctx).unwrap();

        let saved: MetricHistory = load_json(dir.path().join(HISTORY_FILE)).unwrap();
        assert_eq!(saved["loss"][0], LogValue::Float(0.5));
        assert!(saved["loss"][1].as_f64().is_some_and(f64::is_nan));

        let restored: History = serde_json::from_str(&serde_json::to_string(&history).unwrap()).unwrap();
        assert!(restored.history()["loss"][1].as_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_history_persists_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::new().every_k_examples(0).save_to(dir.path());
        let mut ctx = RunContext::default();
        history.on_train_begin(&mut Logs::new(), &mut ctx).unwrap();
        history.on_batch_end(1, &mut batch_logs(4), &mut ctx).unwrap();
        history.on_epoch_end(0, &mut Logs::new().with("loss", 0.7), &mut ctx).unwrap();
        history.on_epoch_end(1, &mut Logs::new().with("loss", 0.6), &mut ctx).unwrap();

        let saved: MetricHistory = load_json(dir.path().join(HISTORY_FILE)).unwrap();
        assert_eq!(saved["loss"], vec![LogValue::Float(0.7), LogValue::Float(0.6)]);

        let saved_batch: MetricHistory = load_json(dir.path().join(HISTORY_BATCH_FILE)).unwrap();
        assert_eq!(saved_batch["size"], vec![LogValue::Int(4)]);
    }

    #[test]
    fn test_history_without_batch_saving_skips_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = History::new().save_to(dir.path());
        history
            .on_epoch_end(0, &mut Logs::new().with("loss", 0.7), &mut RunContext::default())
            .unwrap();
        assert!(dir.path().join(HISTORY_FILE).exists());
        assert!(!dir.path().join(HISTORY_BATCH_FILE).exists());
    }

    #[test]
    fn test_history_train_begin_resets() {
        let mut history = History::new().every_k_examples(1);
        let mut ctx = RunContext::default();
        history.on_batch_end(1, &mut batch_logs(8), &mut ctx).unwrap();
        history.on_epoch_end(0, &mut Logs::new().with("loss", 1.0), &mut ctx).unwrap();

        history.on_train_begin(&mut Logs::new(), &mut ctx).unwrap();
        assert!(history.history().is_empty());
        assert!(history.history_batch().is_empty());
        assert_eq!(history.examples_seen(), 0);
    }
}
