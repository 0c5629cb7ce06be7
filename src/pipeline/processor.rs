//! Per-sample orchestration: retrieve, align, summarize, write.

use crate::config::PipelineConfig;
use crate::database::retrieval::{file_name, Retrieve, ToolRetriever};
use crate::io::fastq::count_reads;
use crate::io::output::{write_document, Destination};
use crate::metadata::ReferenceMetadata;
use crate::pipeline::aligner::{Aligner, DiamondAligner};
use crate::pipeline::report::{generate_report, SampleReport, SampleResults};
use crate::pipeline::summary::summarize_alignments;
use crate::pipeline::PipelineError;
use crate::utils::LogCapture;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Reference database and metadata shared by every sample of a run.
#[derive(Debug)]
pub struct ReferenceSet {
    /// Local copy of the DIAMOND database
    pub database: PathBuf,
    pub database_uri: String,
    pub metadata: ReferenceMetadata,
    pub metadata_uri: String,
}

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Results written to `location`
    Completed { location: String },
    /// Output already present and overwriting is disabled
    Skipped { location: String },
}

/// Runs the full pipeline for individual samples.
///
/// Each sample gets its own temporary directory under `workspace`, which is
/// removed when the sample finishes, whether it succeeded or not. A failing
/// sample never writes a result document.
pub struct SampleProcessor<'a> {
    references: &'a ReferenceSet,
    config: &'a PipelineConfig,
    destination: Destination,
    workspace: PathBuf,
    logs: LogCapture,
    retriever: Box<dyn Retrieve + 'a>,
    aligner: Box<dyn Aligner + 'a>,
}

impl<'a> SampleProcessor<'a> {
    pub fn new(
        references: &'a ReferenceSet,
        config: &'a PipelineConfig,
        destination: Destination,
        workspace: &Path,
        logs: LogCapture,
    ) -> Self {
        SampleProcessor {
            references,
            config,
            destination,
            workspace: workspace.to_path_buf(),
            logs,
            retriever: Box::new(ToolRetriever::default()),
            aligner: Box::new(DiamondAligner::new(config.aligner.clone())),
        }
    }

    pub fn with_retriever(mut self, retriever: impl Retrieve + 'a) -> Self {
        self.retriever = Box::new(retriever);
        self
    }

    pub fn with_aligner(mut self, aligner: impl Aligner + 'a) -> Self {
        self.aligner = Box::new(aligner);
        self
    }

    /// Name of the result document for an input.
    pub fn output_name(input_uri: &str) -> String {
        format!("{}.json.gz", file_name(input_uri))
    }

    pub fn process(&self, input_uri: &str) -> Result<SampleOutcome, PipelineError> {
        let start = Instant::now();
        info!("Processing input argument: {}", input_uri);

        let output_name = Self::output_name(input_uri);
        if !self.config.overwrite && self.destination.exists(&output_name)? {
            let location = self.destination.location_of(&output_name);
            warn!("Output already exists, skipping: {}", location);
            return Ok(SampleOutcome::Skipped { location });
        }

        let sample_dir = tempfile::Builder::new()
            .prefix("sample-")
            .tempdir_in(&self.workspace)?;
        info!("Making temp folder for this sample: {}", sample_dir.path().display());

        let result = self.run_sample(input_uri, &output_name, sample_dir.path(), start);

        info!("Removing temporary folder: {}", sample_dir.path().display());
        if let Err(e) = sample_dir.close() {
            warn!("Failed to remove temporary folder: {}", e);
        }
        result
    }

    fn run_sample(
        &self,
        input_uri: &str,
        output_name: &str,
        workdir: &Path,
        start: Instant,
    ) -> Result<SampleOutcome, PipelineError> {
        let reads = self.retriever.fetch(input_uri, workdir)?;
        let alignments = self.aligner.align(&reads, &self.references.database, workdir)?;
        let summary = summarize_alignments(
            &alignments,
            &self.references.metadata,
            &self.config.summary,
        )?;

        info!("Counting the total number of reads");
        let total_reads =
            count_reads(&reads).map_err(|e| PipelineError::parse(&reads, e.to_string()))?;

        let mut report = SampleReport {
            input_path: input_uri.to_string(),
            input: file_name(input_uri).to_string(),
            output_folder: self.destination.uri(),
            ref_db: self.references.database.display().to_string(),
            ref_db_url: self.references.database_uri.clone(),
            metadata_url: self.references.metadata_uri.clone(),
            results: SampleResults {
                proteins: summary.proteins,
                genomes: summary.genomes,
            },
            parse_summary: summary.parse_stats,
            assigned_reads: summary.assigned_reads,
            total_reads,
            time_elapsed: start.elapsed().as_secs_f64(),
            settings: self.config.clone(),
            logs: Vec::new(),
        };
        info!("\n{}", generate_report(&report));
        report.logs = self.logs.snapshot();

        let local = workdir.join(output_name);
        write_document(&report, &local)?;
        let location = self.destination.deliver(&local, output_name)?;
        Ok(SampleOutcome::Completed { location })
    }
}
