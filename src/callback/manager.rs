//! Callback manager for dispatching events to multiple callbacks

use super::traits::{RunContext, TrainStart, TrainerCallback};
use crate::error::Result;
use crate::logs::Logs;

/// Manages multiple callbacks and dispatches events in insertion order.
///
/// Every callback sees the same `Logs` and `RunContext`, so keys added by an
/// earlier callback are visible to later ones within the same hook. The first
/// error stops dispatch of that hook and is returned to the driver.
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
    ctx: RunContext,
}

impl CallbackManager {
    /// Create new callback manager
    pub fn new() -> Self {
        Self { callbacks: Vec::new(), ctx: RunContext::default() }
    }

    /// Add a callback
    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Add an already boxed callback
    pub fn add_boxed(&mut self, callback: Box<dyn TrainerCallback>) {
        self.callbacks.push(callback);
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Get number of callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Names of the registered callbacks, in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// Shared run context
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Fire train begin event
    ///
    /// Stops at the first callback reporting [`TrainStart::AlreadyFinished`].
    pub fn on_train_begin(&mut self, logs: &mut Logs) -> Result<TrainStart> {
        self.ctx = RunContext::default();
        for cb in &mut self.callbacks {
            if cb.on_train_begin(logs, &mut self.ctx)? == TrainStart::AlreadyFinished {
                log::info!("{} reports the run already finished", cb.name());
                return Ok(TrainStart::AlreadyFinished);
            }
        }
        Ok(TrainStart::Ready)
    }

    /// Fire train end event
    pub fn on_train_end(&mut self, logs: &mut Logs) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.on_train_end(logs, &mut self.ctx)?;
        }
        Ok(())
    }

    /// Fire epoch begin event
    pub fn on_epoch_begin(&mut self, epoch: usize, logs: &mut Logs) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.on_epoch_begin(epoch, logs, &mut self.ctx)?;
        }
        Ok(())
    }

    /// Fire epoch end event
    pub fn on_epoch_end(&mut self, epoch: usize, logs: &mut Logs) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.on_epoch_end(epoch, logs, &mut self.ctx)?;
        }
        Ok(())
    }

    /// Fire batch begin event
    pub fn on_batch_begin(&mut self, batch: usize, logs: &mut Logs) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.on_batch_begin(batch, logs, &mut self.ctx)?;
        }
        Ok(())
    }

    /// Fire batch end event
    pub fn on_batch_end(&mut self, batch: usize, logs: &mut Logs) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.on_batch_end(batch, logs, &mut self.ctx)?;
        }
        Ok(())
    }

    /// Fire backward end event
    pub fn on_backward_end(&mut self, batch: usize) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.on_backward_end(batch, &mut self.ctx)?;
        }
        Ok(())
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}
