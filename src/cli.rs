use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;

use crate::config::{
    AlignerSettings, InclusionPolicy, InputOrder, PipelineConfig, Strictness, SummaryConfig,
};
use crate::database::{Retrieve, ToolRetriever};
use crate::io::output::Destination;
use crate::metadata::load_metadata;
use crate::pipeline::{ReferenceSet, SampleOutcome, SampleProcessor};
use crate::utils::{process_each, LogCapture};

/// Identify viral genomes in sequencing reads by translated alignment.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Reads to process: local paths, s3://, ftp:// or sra://<accession>.
    /// Separate multiple inputs with commas.
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub input: Vec<String>,

    /// DIAMOND reference database (must end in .dmnd)
    #[arg(long)]
    pub ref_db: String,

    /// Tab-separated protein to genome table for the reference database
    #[arg(long)]
    pub metadata: String,

    /// Folder for the result documents (local path or s3://)
    #[arg(short, long)]
    pub output_folder: String,

    /// Replace result documents that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Path to the DIAMOND executable
    #[arg(long, default_value = "diamond")]
    pub diamond: PathBuf,

    /// DIAMOND block size (billions of letters)
    #[arg(long, default_value_t = 5)]
    pub blocks: usize,

    /// Genetic code used to translate the reads
    #[arg(long, default_value_t = 11)]
    pub query_gencode: u32,

    /// Threads for DIAMOND
    #[arg(short, long, default_value_t = 16)]
    pub threads: usize,

    /// Samples processed at the same time
    #[arg(long, default_value_t = 1)]
    pub sample_jobs: usize,

    /// Folder for temporary files (defaults to the system temp folder)
    #[arg(long)]
    pub temp_folder: Option<PathBuf>,

    /// How malformed alignment lines and unknown proteins are handled
    #[arg(long, value_enum, default_value_t = Strictness::Lenient)]
    pub strictness: Strictness,

    /// Whether the alignment table is sorted by read id
    #[arg(long, value_enum, default_value_t = InputOrder::Unsorted)]
    pub input_order: InputOrder,

    /// Minimum reads for a genome to count as detected
    #[arg(long, default_value_t = 1)]
    pub min_reads: u64,

    /// Minimum detected proteins for a genome to count as detected
    #[arg(long, default_value_t = 1)]
    pub min_proteins: usize,

    /// Report every genome in the metadata, including those without reads
    #[arg(long)]
    pub report_all_genomes: bool,
}

impl Args {
    pub fn to_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            summary: SummaryConfig {
                strictness: self.strictness,
                input_order: self.input_order,
                inclusion: InclusionPolicy {
                    min_reads: self.min_reads,
                    min_proteins_detected: self.min_proteins,
                    report_all_genomes: self.report_all_genomes,
                },
            },
            aligner: AlignerSettings {
                binary: self.diamond.clone(),
                threads: self.threads,
                blocks: self.blocks,
                query_gencode: self.query_gencode,
            },
            temp_folder: self.temp_folder.clone().unwrap_or(defaults.temp_folder),
            overwrite: self.overwrite,
            sample_jobs: self.sample_jobs.max(1),
        }
    }

    /// Inputs with surrounding whitespace and empty entries removed.
    pub fn inputs(&self) -> Vec<String> {
        self.input
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Runs every input through the pipeline.
///
/// Failing to fetch or load the reference data stops the run; a failing
/// sample is logged and the remaining samples still run. The run fails if any
/// sample failed.
pub fn run_cli(args: Args, logs: LogCapture) -> Result<()> {
    let config = args.to_config();
    let inputs = args.inputs();
    if inputs.is_empty() {
        bail!("No inputs given");
    }
    let destination = Destination::parse(&args.output_folder)?;

    fs::create_dir_all(&config.temp_folder).with_context(|| {
        format!("Failed to create temp folder {}", config.temp_folder.display())
    })?;
    let run_dir = tempfile::Builder::new()
        .prefix("map-viruses-")
        .tempdir_in(&config.temp_folder)
        .context("Failed to create run folder")?;
    info!("Using temp folder: {}", run_dir.path().display());

    let retriever = ToolRetriever::default();
    let database = retriever
        .fetch_with_ending(&args.ref_db, run_dir.path(), ".dmnd")
        .context("Failed to retrieve the reference database")?;
    let metadata_path = retriever
        .fetch(&args.metadata, run_dir.path())
        .context("Failed to retrieve the reference metadata")?;
    let metadata = load_metadata(&metadata_path).context("Failed to load the reference metadata")?;
    info!(
        "Loaded metadata for {} proteins in {} genomes",
        metadata.protein_count(),
        metadata.genome_count()
    );

    let references = ReferenceSet {
        database,
        database_uri: args.ref_db.clone(),
        metadata,
        metadata_uri: args.metadata.clone(),
    };
    let processor = SampleProcessor::new(&references, &config, destination, run_dir.path(), logs)
        .with_retriever(retriever);

    let result = run_samples(&inputs, &processor, config.sample_jobs);

    info!("Removing temporary folder: {}", run_dir.path().display());
    run_dir.close().context("Failed to remove temp folder")?;

    result?;
    info!("Done");
    Ok(())
}

/// Processes every input, `jobs` at a time.
///
/// A failing sample is logged with its stage and does not stop the others;
/// the result is an error when at least one sample failed.
pub fn run_samples(inputs: &[String], processor: &SampleProcessor, jobs: usize) -> Result<()> {
    info!("Processing {} inputs, {} at a time", inputs.len(), jobs);
    let outcomes = process_each(inputs, |input| processor.process(input), jobs)?;

    let mut failed = 0usize;
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(SampleOutcome::Completed { location }) => info!("{}: wrote {}", input, location),
            Ok(SampleOutcome::Skipped { location }) => warn!("{}: skipped, {} exists", input, location),
            Err(e) => {
                error!("{}: failed during {}: {}", input, e.stage(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} samples failed", failed, inputs.len());
    }
    Ok(())
}
