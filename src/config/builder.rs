//! Build the callback stack from configuration

use std::time::Duration;

use super::schema::HooksSpec;
use crate::callback::{
    CallbackManager, History, LRSchedule, MetaSaver, ModelCheckpoint, ScalarSummaries,
};
use crate::error::Result;
use crate::model::{SharedModel, SharedOptimizer};

/// Build a [`CallbackManager`] for `spec`.
///
/// Callbacks are registered in the order `MetaSaver`, `History`,
/// `LRSchedule`, `ModelCheckpoint`, `ScalarSummaries`, skipping the ones
/// the configuration leaves out. `History` runs before anything that reads
/// `examples_seen` from the logs.
pub fn build_callbacks(
    spec: &HooksSpec,
    model: SharedModel,
    optimizer: SharedOptimizer,
) -> Result<CallbackManager> {
    spec.validate()?;
    let mut manager = CallbackManager::new();

    if spec.meta {
        let mut meta = MetaSaver::new(&spec.output_dir)
            .force_train(spec.force_train)
            .with_config(spec.config.clone());
        if let Some(entry_point) = &spec.entry_point {
            meta = meta.entry_point(entry_point);
        }
        manager.add(meta);
    }

    if let Some(history_spec) = &spec.history {
        let mut history = History::new().save_to(&spec.output_dir);
        if let Some(k) = history_spec.save_every_k_examples {
            history = history.every_k_examples(k);
        }
        manager.add(history);
    }

    if let Some(schedule) = &spec.lr_schedule {
        manager.add(LRSchedule::new(schedule.clone(), optimizer.clone())?);
    }

    if let (Some(checkpoint), Some(path)) = (&spec.checkpoint, spec.checkpoint_path()) {
        let cb = ModelCheckpoint::new(path)
            .monitor(&checkpoint.monitor)
            .with_mode(checkpoint.monitor_mode())
            .save_best_only(checkpoint.save_best_only)
            .verbose(checkpoint.verbose)
            .period(checkpoint.period)?
            .with_model(model, optimizer);
        manager.add(cb);
    }

    if let Some(summaries) = &spec.summaries {
        manager.add(
            ScalarSummaries::new(&spec.output_dir)
                .flush_every(Duration::from_secs(summaries.flush_secs)),
        );
    }

    log::debug!("built callbacks: {:?}", manager.names());
    Ok(manager)
}
