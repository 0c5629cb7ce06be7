use std::io;
use std::path::PathBuf;
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to retrieve '{uri}': {reason}")]
    Retrieval { uri: String, reason: String },

    #[error("Alignment failed: {0}")]
    AlignmentInvocation(String),

    #[error("Parse error in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Protein '{protein_id}' (line {line}) is not present in the metadata")]
    AggregationInconsistency { protein_id: String, line: u64 },

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn retrieval(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Retrieval {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Name of the pipeline stage that produced this error, for log transcripts.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Retrieval { .. } => "retrieval",
            PipelineError::AlignmentInvocation(_) => "alignment",
            PipelineError::Parse { .. } => "parsing",
            PipelineError::AggregationInconsistency { .. } => "aggregation",
            PipelineError::Output(_) => "output",
            PipelineError::Io(_) => "io",
        }
    }
}
