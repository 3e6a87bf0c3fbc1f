//! Closure-backed callbacks

use serde::{Deserialize, Serialize};

use super::traits::{RunContext, TrainStart, TrainerCallback};
use crate::error::{HookError, Result};
use crate::logs::Logs;

type TrainFn = Box<dyn FnMut(&Logs) + Send>;
type IndexedFn = Box<dyn FnMut(usize, &Logs) + Send>;

/// Callback assembled from optional closures, one per hook.
///
/// Hooks without a closure are no-ops. `on_backward_end` is never wrapped.
///
/// # Example
///
/// ```
/// use entrenar_hooks::callback::LambdaCallback;
///
/// let cb = LambdaCallback::new()
///     .epoch_end(|epoch, logs| println!("epoch {epoch}: {:?}", logs.get_f64("loss")));
/// ```
#[derive(Default)]
pub struct LambdaCallback {
    train_begin: Option<TrainFn>,
    train_end: Option<TrainFn>,
    epoch_begin: Option<IndexedFn>,
    epoch_end: Option<IndexedFn>,
    batch_begin: Option<IndexedFn>,
    batch_end: Option<IndexedFn>,
}

impl LambdaCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn train_begin(mut self, f: impl FnMut(&Logs) + Send + 'static) -> Self {
        self.train_begin = Some(Box::new(f));
        self
    }

    pub fn train_end(mut self, f: impl FnMut(&Logs) + Send + 'static) -> Self {
        self.train_end = Some(Box::new(f));
        self
    }

    pub fn epoch_begin(mut self, f: impl FnMut(usize, &Logs) + Send + 'static) -> Self {
        self.epoch_begin = Some(Box::new(f));
        self
    }

    pub fn epoch_end(mut self, f: impl FnMut(usize, &Logs) + Send + 'static) -> Self {
        self.epoch_end = Some(Box::new(f));
        self
    }

    pub fn batch_begin(mut self, f: impl FnMut(usize, &Logs) + Send + 'static) -> Self {
        self.batch_begin = Some(Box::new(f));
        self
    }

    pub fn batch_end(mut self, f: impl FnMut(usize, &Logs) + Send + 'static) -> Self {
        self.batch_end = Some(Box::new(f));
        self
    }
}

impl TrainerCallback for LambdaCallback {
    fn on_train_begin(&mut self, logs: &mut Logs, _ctx: &mut RunContext) -> Result<TrainStart> {
        if let Some(f) = &mut self.train_begin {
            f(logs);
        }
        Ok(TrainStart::Ready)
    }

    fn on_train_end(&mut self, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        if let Some(f) = &mut self.train_end {
            f(logs);
        }
        Ok(())
    }

    fn on_epoch_begin(&mut self, epoch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        if let Some(f) = &mut self.epoch_begin {
            f(epoch, logs);
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        if let Some(f) = &mut self.epoch_end {
            f(epoch, logs);
        }
        Ok(())
    }

    fn on_batch_begin(&mut self, batch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        if let Some(f) = &mut self.batch_begin {
            f(batch, logs);
        }
        Ok(())
    }

    fn on_batch_end(&mut self, batch: usize, logs: &mut Logs, _ctx: &mut RunContext) -> Result<()> {
        if let Some(f) = &mut self.batch_end {
            f(batch, logs);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LambdaCallback"
    }
}

/// Persistable counters of an [`EveryKExamples`] callback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveryKExamplesState {
    pub k: u64,
    pub call_after_first_batch: bool,
    pub examples_seen: u64,
    pub examples_seen_since_last_call: u64,
    pub calls: u64,
}

impl EveryKExamplesState {
    pub fn new(k: u64) -> Self {
        Self {
            k,
            call_after_first_batch: false,
            examples_seen: 0,
            examples_seen_since_last_call: 0,
            calls: 0,
        }
    }
}

impl Default for EveryKExamplesState {
    fn default() -> Self {
        Self::new(45_000)
    }
}

/// Runs a closure every time more than `k` examples went by since its last call.
///
/// Requires a `size` key in the batch logs. With `call_after_first_batch` the
/// closure also fires after batch 1. Only [`EveryKExamplesState`] is
/// persisted; after restoring with [`from_state`](Self::from_state) the
/// closure must be rebound with [`bind`](Self::bind).
pub struct EveryKExamples {
    state: EveryKExamplesState,
    on_k_examples: Option<Box<dyn FnMut(&Logs) + Send>>,
    hooks: LambdaCallback,
}

impl EveryKExamples {
    /// Fire `on_k_examples` every `k` examples
    pub fn new(k: u64, on_k_examples: impl FnMut(&Logs) + Send + 'static) -> Self {
        Self {
            state: EveryKExamplesState::new(k),
            on_k_examples: Some(Box::new(on_k_examples)),
            hooks: LambdaCallback::new(),
        }
    }

    /// Restore counters without a closure
    pub fn from_state(state: EveryKExamplesState) -> Self {
        Self { state, on_k_examples: None, hooks: LambdaCallback::new() }
    }

    /// Also fire after the first batch
    pub fn call_after_first_batch(mut self, enabled: bool) -> Self {
        self.state.call_after_first_batch = enabled;
        self
    }

    /// Closures for the remaining hooks; its `on_batch_end` runs before the K-examples check
    pub fn with_hooks(mut self, hooks: LambdaCallback) -> Self {
        self.hooks = hooks;
        self
    }

    /// Attach (or replace) the closure
    pub fn bind(&mut self, on_k_examples: impl FnMut(&Logs) + Send + 'static) {
        self.on_k_examples = Some(Box::new(on_k_examples));
    }

    pub fn state(&self) -> &EveryKExamplesState {
        &self.state
    }

    pub fn calls(&self) -> u64 {
        self.state.calls
    }
}

impl TrainerCallback for EveryKExamples {
    fn on_train_begin(&mut self, logs: &mut Logs, ctx: &mut RunContext) -> Result<TrainStart> {
        self.hooks.on_train_begin(logs, ctx)
    }

    fn on_train_end(&mut self, logs: &mut Logs, ctx: &mut RunContext) -> Result<()> {
        self.hooks.on_train_end(logs, ctx)
    }

    fn on_epoch_begin(&mut self, epoch: usize, logs: &mut Logs, ctx: &mut RunContext) -> Result<()> {
        self.hooks.on_epoch_begin(epoch, logs, ctx)
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &mut Logs, ctx: &mut RunContext) -> Result<()> {
        self.hooks.on_epoch_end(epoch, logs, ctx)
    }

    fn on_batch_begin(&mut self, batch: usize, logs: &mut Logs, ctx: &mut RunContext) -> Result<()> {
        self.hooks.on_batch_begin(batch, logs, ctx)
    }

    fn on_batch_end(&mut self, batch: usize, logs: &mut Logs, ctx: &mut RunContext) -> Result<()> {
        self.hooks.on_batch_end(batch, logs, ctx)?;

        let size = logs.size(self.name())?;
        let first_batch = self.state.call_after_first_batch && batch == 1;
        let fire = first_batch || self.state.examples_seen_since_last_call + size > self.state.k;
        // counters stay untouched on error so the batch can be replayed after `bind`
        if fire && self.on_k_examples.is_none() {
            return Err(HookError::Unbound { callback: "EveryKExamples", what: "on_k_examples closure" });
        }

        let state = &mut self.state;
        state.examples_seen += size;
        state.examples_seen_since_last_call += size;
        let Some(f) = self.on_k_examples.as_mut().filter(|_| fire) else {
            return Ok(());
        };

        log::info!(
            "Batch {batch}: firing on K examples, ex seen = {}, ex seen last call = {}",
            state.examples_seen,
            state.examples_seen_since_last_call
        );
        f(logs);
        state.examples_seen_since_last_call = 0;
        state.calls += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "EveryKExamples"
    }
}
