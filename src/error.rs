//! Error types with actionable diagnostics.
//!
//! Every variant carries enough context to tell the driver what went wrong
//! and, where it helps, what to change.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hook operations.
pub type Result<T> = std::result::Result<T, HookError>;

/// Errors raised by callbacks and the callback manager.
#[derive(Error, Debug)]
pub enum HookError {
    /// A key the callback cannot work without is absent from the logs.
    #[error("{callback}: required log key '{key}' is missing\n  → Include '{key}' in the logs passed to on_batch_end")]
    MissingLogKey { key: String, callback: &'static str },

    /// A log key is present but has an unusable value.
    #[error("Invalid value for log key '{key}': {message}")]
    InvalidLogValue { key: String, message: String },

    /// Configuration value is invalid.
    #[error("Invalid configuration value for '{field}': {message}\n  → {suggestion}")]
    ConfigValue { field: String, message: String, suggestion: String },

    /// Configuration document could not be read or parsed.
    #[error("Invalid configuration in {path}:\n  {message}\n  → Check YAML/JSON syntax at the indicated line")]
    ConfigParsing { path: PathBuf, message: String },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A live handle (model, optimizer, closure) was not bound before use.
    #[error("{callback}: no {what} bound\n  → Call bind() after restoring the callback from saved state")]
    Unbound { callback: &'static str, what: &'static str },

    /// A hook ran before the hook that initializes it.
    #[error("{callback}: on_train_end called before on_train_begin")]
    NotStarted { callback: &'static str },

    /// A shared handle's mutex was poisoned by a panicking holder.
    #[error("Lock poisoned: {what}")]
    LockPoisoned { what: &'static str },
}

impl HookError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a configuration value error.
    pub fn config(
        field: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::ConfigValue {
            field: field.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Check if this error is caused by driver input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingLogKey { .. }
                | Self::InvalidLogValue { .. }
                | Self::ConfigValue { .. }
                | Self::ConfigParsing { .. }
                | Self::Unbound { .. }
                | Self::NotStarted { .. }
        )
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingLogKey { .. } => "H001",
            Self::InvalidLogValue { .. } => "H002",
            Self::ConfigValue { .. } => "H010",
            Self::ConfigParsing { .. } => "H011",
            Self::Io { .. } => "H020",
            Self::Serialization { .. } => "H021",
            Self::Unbound { .. } => "H030",
            Self::NotStarted { .. } => "H031",
            Self::LockPoisoned { .. } => "H040",
        }
    }
}

impl From<serde_json::Error> for HookError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for HookError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization { message: e.to_string() }
    }
}
