//! Lifecycle callbacks for training loops.
//!
//! A training loop drives a [`CallbackManager`](callback::CallbackManager)
//! through a fixed set of hooks; callbacks plugged into it handle the
//! cross-cutting work of a run without the loop knowing about them:
//!
//! - [`History`](callback::History): per-epoch and periodic per-batch metric history
//! - [`ModelCheckpoint`](callback::ModelCheckpoint): periodic or best-only weight snapshots
//! - [`LRSchedule`](callback::LRSchedule): piecewise-constant learning rates
//! - [`ScalarSummaries`](callback::ScalarSummaries): numeric metric export
//! - [`MetaSaver`](callback::MetaSaver): run provenance and the `FINISHED` sentinel
//! - [`LambdaCallback`](callback::LambdaCallback) /
//!   [`EveryKExamples`](callback::EveryKExamples): closure-backed hooks
//!
//! # Example
//!
//! ```
//! use entrenar_hooks::callback::{CallbackManager, History, TrainStart};
//! use entrenar_hooks::Logs;
//!
//! # fn main() -> entrenar_hooks::Result<()> {
//! let mut callbacks = CallbackManager::new();
//! callbacks.add(History::new().every_k_examples(64));
//!
//! if callbacks.on_train_begin(&mut Logs::new())? == TrainStart::AlreadyFinished {
//!     return Ok(());
//! }
//! for epoch in 0..2 {
//!     callbacks.on_epoch_begin(epoch, &mut Logs::new())?;
//!     for batch in 1..=4 {
//!         callbacks.on_batch_begin(batch, &mut Logs::new())?;
//!         callbacks.on_backward_end(batch)?;
//!         callbacks.on_batch_end(batch, &mut Logs::new().with("size", 32i64).with("loss", 0.5))?;
//!     }
//!     callbacks.on_epoch_end(epoch, &mut Logs::new().with("loss", 0.4))?;
//! }
//! callbacks.on_train_end(&mut Logs::new())?;
//! assert_eq!(callbacks.context().examples_seen, Some(256));
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod error;
pub mod io;
pub mod logs;
pub mod model;

pub use error::{HookError, Result};
pub use logs::{LogValue, Logs, MetricHistory};
