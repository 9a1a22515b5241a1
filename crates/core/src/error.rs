use thiserror::Error;

/// Fatal failures. Timeouts and cancellation are ordinary outcomes
/// (`StepOutcome`, `PhaseOutcome`), not errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed workflow fields. Aborts the run before or at
    /// the offending step.
    #[error("config error: {0}")]
    Config(String),

    /// A reference pattern or other asset could not be loaded. Aborts the
    /// containing phase.
    #[error("resource error: {0}")]
    Resource(String),
}

pub type Result<T> = std::result::Result<T, Error>;
