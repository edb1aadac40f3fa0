//! Error types for the funnelcast engine.
//!
//! Every variant is a local validation failure raised before any computation
//! starts. Nothing here is retryable: the engine performs no I/O outside of
//! config loading, so callers decide how to present these (e.g. HTTP 400).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    // ===================
    // Input Errors
    // ===================
    #[error("Unknown channel '{channel}'. Available channels: {}", .valid.join(", "))]
    UnknownChannel { channel: String, valid: Vec<String> },

    #[error("Invalid budget: {reason}")]
    InvalidBudget { reason: String },

    #[error("Invalid duration: {months} months (must be at least 1)")]
    InvalidDuration { months: u32 },

    #[error("Infeasible constraints: {reason}")]
    InfeasibleConstraint { reason: String },

    #[error("Invalid channel mix: {reason}")]
    InvalidMix { reason: String },

    #[error("Customer count out of range: {reason}")]
    CountOverflow { reason: String },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid benchmark for '{channel}': {reason}")]
    InvalidBenchmark { channel: String, reason: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read config file: {}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML in {}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl EngineError {
    pub(crate) fn invalid_budget(reason: impl Into<String>) -> Self {
        Self::InvalidBudget {
            reason: reason.into(),
        }
    }

    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        Self::InfeasibleConstraint {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_mix(reason: impl Into<String>) -> Self {
        Self::InvalidMix {
            reason: reason.into(),
        }
    }

    pub(crate) fn count_overflow(reason: impl Into<String>) -> Self {
        Self::CountOverflow {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Short, stable identifier for the error class (used by the bindings).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownChannel { .. } => "unknown_channel",
            Self::InvalidBudget { .. } => "invalid_budget",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::InfeasibleConstraint { .. } => "infeasible_constraint",
            Self::InvalidMix { .. } => "invalid_mix",
            Self::CountOverflow { .. } => "count_overflow",
            Self::InvalidBenchmark { .. } => "invalid_benchmark",
            Self::InvalidConfig { .. } | Self::ConfigRead { .. } | Self::ConfigParse { .. } => {
                "invalid_config"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Reject non-positive or non-finite money amounts.
pub(crate) fn ensure_positive_budget(label: &str, amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(EngineError::invalid_budget(format!(
            "{label} must be a positive amount, got {amount}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_duration(months: u32) -> Result<()> {
    if months == 0 {
        return Err(EngineError::InvalidDuration { months });
    }
    Ok(())
}
