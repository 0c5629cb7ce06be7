//! Run configuration.
//!
//! Everything that changes how a sample is processed lives here, so that the
//! effective settings can be embedded verbatim in each output document.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How rows that cannot be turned into a usable alignment record are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Abort the sample on the first bad row.
    Strict,
    /// Skip bad rows, log a warning and count them.
    #[default]
    Lenient,
}

/// Ordering guarantee of the alignment table, used by the best-hit reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputOrder {
    /// Sorted by read id (`LC_ALL=C sort -k1,1`); reduce while streaming.
    Sorted,
    /// No ordering guarantee; keep one candidate per read until end of input.
    #[default]
    Unsorted,
}

/// Which genome rows are retained in the final summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionPolicy {
    /// Minimum number of assigned reads for a genome to count as detected
    pub min_reads: u64,
    /// Minimum number of distinct proteins with reads
    pub min_proteins_detected: usize,
    /// Keep every genome in the metadata, detected or not
    pub report_all_genomes: bool,
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        InclusionPolicy {
            min_reads: 1,
            min_proteins_detected: 1,
            report_all_genomes: false,
        }
    }
}

/// Settings passed to the external aligner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignerSettings {
    pub binary: PathBuf,
    pub threads: usize,
    pub blocks: usize,
    pub query_gencode: u32,
}

impl Default for AlignerSettings {
    fn default() -> Self {
        AlignerSettings {
            binary: PathBuf::from("diamond"),
            threads: 16,
            blocks: 5,
            query_gencode: 11,
        }
    }
}

/// Settings that drive the aggregation core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub strictness: Strictness,
    pub input_order: InputOrder,
    pub inclusion: InclusionPolicy,
}

/// Complete configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub summary: SummaryConfig,
    pub aligner: AlignerSettings,
    pub temp_folder: PathBuf,
    pub overwrite: bool,
    pub sample_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            summary: SummaryConfig::default(),
            aligner: AlignerSettings::default(),
            temp_folder: std::env::temp_dir(),
            overwrite: false,
            sample_jobs: 1,
        }
    }
}
