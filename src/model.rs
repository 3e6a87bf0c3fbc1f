//! Collaborator traits for the model and optimizer under training.
//!
//! Callbacks only need two things from the training objects: a serializable
//! view for checkpointing and mutable access to the optimizer's learning rates.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{HookError, Result};

/// Anything that can be snapshotted into a weights artifact
pub trait StateDict {
    /// Serializable snapshot of the current parameters/state
    fn state_dict(&self) -> serde_json::Value;
}

/// A group of parameters sharing optimizer hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    /// Group name (for logging)
    pub name: String,
    /// Learning rate applied to this group
    pub lr: f32,
}

impl ParamGroup {
    pub fn new(name: impl Into<String>, lr: f32) -> Self {
        Self { name: name.into(), lr }
    }
}

/// Optimizer whose parameter groups expose a settable learning rate
pub trait Optimizer: StateDict {
    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    /// Set the learning rate of every parameter group
    fn set_lr(&mut self, lr: f32) {
        for group in self.param_groups_mut() {
            group.lr = lr;
        }
    }
}

/// Model handle shared between the driver and callbacks
pub type SharedModel = Arc<Mutex<dyn StateDict + Send>>;

/// Optimizer handle shared between the driver and callbacks
pub type SharedOptimizer = Arc<Mutex<dyn Optimizer + Send>>;

/// Lock a shared handle, mapping poisoning into a [`HookError`]
pub(crate) fn lock<'a, T: ?Sized>(
    handle: &'a Mutex<T>,
    what: &'static str,
) -> Result<MutexGuard<'a, T>> {
    handle.lock().map_err(|_| HookError::LockPoisoned { what })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_set_lr_updates_all_groups() {
        let mut opt = DummyOptimizer::with_groups(3);
        opt.set_lr(0.05);
        assert!(opt.groups.iter().all(|g| (g.lr - 0.05).abs() < f32::EPSILON));
    }

    #[test]
    fn test_lock_shared_handle() {
        let (model, _) = shared(vec![1.0, 2.0], 1);
        let guard = lock(&*model, "model").unwrap();
        assert_eq!(guard.state_dict()["weights"][1], 2.0);
    }
}
