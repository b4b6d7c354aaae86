pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod pipeline;
pub mod report;
pub mod slides;
pub mod state;
pub mod util;

pub use error::PipelineError;
pub use pipeline::{ConversionPipeline, JobHandle};
pub use slides::{Slide, SlideCollection};
pub use state::{ConversionState, Failure, FailureKind, PollResult};
