//! Piecewise-constant learning rate schedule callback

use super::traits::{RunContext, TrainerCallback};
use crate::error::{HookError, Result};
use crate::logs::Logs;
use crate::model::{lock, SharedOptimizer};

/// Sets the optimizer learning rate at the start of every epoch from a
/// table of `(epoch_threshold, rate)` pairs.
///
/// The rate for epoch `e` is the rate of the first pair whose threshold is
/// strictly greater than `e`; past the last threshold the last rate stays.
///
/// # Example
///
/// ```
/// use entrenar_hooks::callback::LRSchedule;
///
/// let rates = LRSchedule::rates(vec![(10, 0.1), (20, 0.01)]).unwrap();
/// assert_eq!(LRSchedule::lookup(&rates, 5), 0.1);
/// assert_eq!(LRSchedule::lookup(&rates, 15), 0.01);
/// assert_eq!(LRSchedule::lookup(&rates, 25), 0.01);
/// ```
pub struct LRSchedule {
    schedule: Vec<(usize, f32)>,
    optimizer: SharedOptimizer,
    current_lr: Option<f32>,
}

impl LRSchedule {
    /// Create a schedule bound to `optimizer`. Fails on an empty schedule.
    pub fn new(schedule: Vec<(usize, f32)>, optimizer: SharedOptimizer) -> Result<Self> {
        Ok(Self { schedule: Self::rates(schedule)?, optimizer, current_lr: None })
    }

    /// Validate and sort a schedule by threshold
    pub fn rates(mut schedule: Vec<(usize, f32)>) -> Result<Vec<(usize, f32)>> {
        if schedule.is_empty() {
            return Err(HookError::config(
                "lr_schedule",
                "schedule is empty",
                "Provide at least one (epoch, rate) pair",
            ));
        }
        if let Some((epoch, rate)) = schedule.iter().find(|(_, r)| !r.is_finite() || *r < 0.0) {
            return Err(HookError::config(
                "lr_schedule",
                format!("rate {rate} for epoch {epoch} is not a finite non-negative number"),
                "Use rates >= 0.0",
            ));
        }
        schedule.sort_by_key(|(epoch, _)| *epoch);
        Ok(schedule)
    }

    /// Rate applicable at `epoch` for an already sorted, non-empty schedule
    pub fn lookup(schedule: &[(usize, f32)], epoch: usize) -> f32 {
        schedule
            .iter()
            .find(|(threshold, _)| epoch < *threshold)
            .or_else(|| schedule.last())
            .map_or(0.0, |(_, rate)| *rate)
    }

    /// Rate this schedule applies at `epoch`
    pub fn rate_for_epoch(&self, epoch: usize) -> f32 {
        Self::lookup(&self.schedule, epoch)
    }

    /// Last rate written to the optimizer
    pub fn current_lr(&self) -> Option<f32> {
        self.current_lr
    }
}

impl TrainerCallback for LRSchedule {
    fn on_epoch_begin(&mut self, epoch: usize, _logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        let lr = self.rate_for_epoch(epoch);
        lock(&*self.optimizer, "optimizer")?.set_lr(lr);
        self.current_lr = Some(lr);
        log::info!("Fix learning rate to {lr}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LRSchedule"
    }
}
