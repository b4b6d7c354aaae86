use crate::engine::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// A tool exited non-zero, could not be spawned, or produced no output.
    ToolFailure,
    /// Reading or writing the working directory failed.
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn tool(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ToolFailure,
            reason: reason.into(),
        }
    }

    pub fn filesystem(err: &anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Filesystem,
            reason: format!("{err:#}"),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.reason)
    }
}

/// Position of a job in the conversion. Non-terminal states only ever move
/// forward; `Finished`, `Cancelled` and `Failed` are absorbing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionState {
    Init,
    ConvertingToIntermediate,
    ConvertingToImages,
    Finished,
    Cancelled,
    Failed(Failure),
}

impl ConversionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Failed(_))
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::ConvertingToIntermediate => 1,
            Self::ConvertingToImages => 2,
            Self::Finished | Self::Cancelled | Self::Failed(_) => 3,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ConvertingToIntermediate => Some(Stage::Intermediate),
            Self::ConvertingToImages => Some(Stage::Images),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ConvertingToIntermediate => "converting_to_intermediate",
            Self::ConvertingToImages => "converting_to_images",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of one `poll` tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollResult {
    /// Still working; progress is unknown, so callers should pulse rather than
    /// show a percentage. `None` only before the first tool has been launched.
    InProgress(Option<Stage>),
    Finished,
    Cancelled,
    Failed(Failure),
}

impl PollResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress(_))
    }
}

impl From<&ConversionState> for PollResult {
    fn from(state: &ConversionState) -> Self {
        match state {
            ConversionState::Finished => Self::Finished,
            ConversionState::Cancelled => Self::Cancelled,
            ConversionState::Failed(f) => Self::Failed(f.clone()),
            other => Self::InProgress(other.stage()),
        }
    }
}
