pub mod abundance;
pub mod aligner;
pub mod error;
pub mod processor;
pub mod reducer;
pub mod report;
pub mod rollup;
pub mod summary;

pub use error::PipelineError;
pub use processor::{ReferenceSet, SampleOutcome, SampleProcessor};
