//! Callback system for training events
//!
//! Provides extensible hooks for training loop events:
//! - `on_train_begin` / `on_train_end`
//! - `on_epoch_begin` / `on_epoch_end`
//! - `on_batch_begin` / `on_batch_end`
//! - `on_backward_end`
//!
//! # Example
//!
//! ```rust
//! use entrenar_hooks::callback::{RunContext, TrainerCallback};
//! use entrenar_hooks::{Logs, Result};
//!
//! struct PrintCallback;
//!
//! impl TrainerCallback for PrintCallback {
//!     fn on_epoch_end(&mut self, epoch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
//!         println!("Epoch {} finished with loss {:?}", epoch, logs.get_f64("loss"));
//!         Ok(())
//!     }
//! }
//! ```

mod checkpoint;
mod history;
mod lambda;
mod lr_schedule;
mod manager;
mod meta;
mod summary;
mod traits;

// Re-export all public types
pub use checkpoint::{ModelCheckpoint, MonitorMode};
pub use history::{History, HISTORY_BATCH_FILE, HISTORY_FILE};
pub use lambda::{EveryKExamples, EveryKExamplesState, LambdaCallback};
pub use lr_schedule::LRSchedule;
pub use manager::CallbackManager;
pub use meta::{MetaSaver, RunMeta, CONFIG_FILE, FINISHED_FILE, META_FILE};
pub use summary::{ScalarRecord, ScalarSummaries, SummaryWriter, SUMMARY_FILE};
pub use traits::{RunContext, TrainStart, TrainerCallback};
