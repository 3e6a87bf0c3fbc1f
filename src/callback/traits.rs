//! Core traits and types for the callback system
//!
//! - `TrainerCallback` - The trait all callbacks implement
//! - `RunContext` - Shared state visible to every callback during a run
//! - `TrainStart` - Outcome of the train-begin hook

use crate::error::Result;
use crate::logs::{Logs, MetricHistory};

/// Shared run state passed to every hook.
///
/// Only the fields below are shared between callbacks; anything else a
/// callback tracks is private to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunContext {
    /// Running example count, maintained by [`History`](super::History) when
    /// batch-level history is enabled
    pub examples_seen: Option<u64>,
    /// Batch-level history accumulated so far, republished by
    /// [`History`](super::History) every time it grows
    pub batch_history: Option<MetricHistory>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Outcome of `on_train_begin`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainStart {
    /// Proceed with training
    Ready,
    /// The output directory already holds a finished run; the driver should stop
    AlreadyFinished,
}

/// Trait for training callbacks
///
/// Implement this trait to hook into training events. All methods have
/// default no-op implementations, so you only need to implement the
/// events you care about.
///
/// Epoch indices are 0-based and batch indices 1-based.
pub trait TrainerCallback: Send {
    /// Called once before training starts
    fn on_train_begin(&mut self, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<TrainStart> {
        Ok(TrainStart::Ready)
    }

    /// Called once after training ends
    fn on_train_end(&mut self, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called before each epoch
    fn on_epoch_begin(&mut self, _epoch: usize, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch with the epoch's metrics
    fn on_epoch_end(&mut self, _epoch: usize, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called before each minibatch
    fn on_batch_begin(&mut self, _batch: usize, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called after each minibatch
    fn on_batch_end(&mut self, _batch: usize, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called after the backward pass, before the optimizer step
    fn on_backward_end(&mut self, _batch: usize, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Get callback name for logging
    fn name(&self) -> &'static str {
        "TrainerCallback"
    }
}
