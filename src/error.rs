use thiserror::Error;

/// Errors surfaced to the caller. Everything else in the run (missing
/// valuations, a non-convergent XIRR, an empty candidate list) is recovered
/// locally and reflected in the result instead of failing the run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("simulation cancelled before completion")]
    Cancelled,
}
