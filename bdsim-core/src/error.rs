//! Structured error types for the bdsim workspace.

use thiserror::Error;

/// Unified error type for all simulation and fitting operations.
#[derive(Debug, Error)]
pub enum BdsimError {
    /// Invalid input (bad arguments, missing or contradictory configuration)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every lineage died before a termination condition was met
    #[error("all lineages went extinct before the termination condition was met")]
    TotalExtinction,

    /// Likelihood could not be evaluated for the given data
    #[error("likelihood estimation failure: {0}")]
    Likelihood(String),

    /// Node ages disagree beyond the requested precision
    #[error("tree is not ultrametric: {0}")]
    NotUltrametric(String),
}

impl BdsimError {
    /// True for errors a caller may recover from by rerunning the process.
    pub fn is_total_extinction(&self) -> bool {
        matches!(self, BdsimError::TotalExtinction)
    }
}

/// Convenience alias used throughout the bdsim workspace.
pub type Result<T> = std::result::Result<T, BdsimError>;
