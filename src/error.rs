use thiserror::Error;

/// Errors returned directly by [`crate::pipeline::ConversionPipeline`] calls.
///
/// Conversion failures after a job has started are not errors of this type:
/// they surface as [`crate::state::ConversionState::Failed`] through `poll`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Rejected at `start`; no working directory was created.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Preparing the working directory failed at `start`, or a slide scan
    /// failed after the job finished.
    #[error("filesystem error: {0}")]
    Filesystem(String),
    /// The call does not make sense for the job's current state or handle.
    #[error("usage error: {0}")]
    Usage(String),
}
