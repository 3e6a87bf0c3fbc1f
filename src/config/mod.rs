//! Declarative callback configuration
//!
//! A run's callbacks can be described in YAML (or JSON) and built in one go:
//!
//! ```no_run
//! use entrenar_hooks::config::{build_callbacks, HooksSpec};
//! # use entrenar_hooks::model::{SharedModel, SharedOptimizer};
//! # fn handles() -> (SharedModel, SharedOptimizer) { unimplemented!() }
//!
//! let spec = HooksSpec::from_file("hooks.yaml")?;
//! let (model, optimizer) = handles();
//! let mut callbacks = build_callbacks(&spec, model, optimizer)?;
//! # Ok::<(), entrenar_hooks::HookError>(())
//! ```

mod builder;
mod schema;

pub use builder::build_callbacks;
pub use schema::{CheckpointSpec, HistorySpec, HooksSpec, SummarySpec};
