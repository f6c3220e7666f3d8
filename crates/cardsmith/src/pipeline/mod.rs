pub mod error;
pub mod runner;

pub use error::{PipelineError, PipelineWarning};
pub use runner::{GenerationOutcome, GenerationSettings, Pipeline};
