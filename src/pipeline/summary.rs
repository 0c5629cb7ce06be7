//! Aggregation core for one sample: parser → reducer → aggregator → rollup.

use crate::config::SummaryConfig;
use crate::io::alignment::{AlignmentReader, ParseStats};
use crate::metadata::ReferenceMetadata;
use crate::pipeline::abundance::{aggregate_proteins, ProteinAbundance};
use crate::pipeline::reducer::best_hits;
use crate::pipeline::rollup::{rollup_genomes, GenomeSummary};
use crate::pipeline::PipelineError;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the aggregation core produces for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Proteins with at least one read, most reads first
    pub proteins: Vec<ProteinAbundance>,
    /// Retained genomes, most reads first
    pub genomes: Vec<GenomeSummary>,
    pub parse_stats: ParseStats,
    /// Distinct reads with a best hit
    pub assigned_reads: u64,
}

/// Summarizes one alignment table against the reference metadata.
pub fn summarize_alignments(
    alignment_path: &Path,
    metadata: &ReferenceMetadata,
    config: &SummaryConfig,
) -> Result<SampleSummary, PipelineError> {
    info!("Parsing alignments from {}", alignment_path.display());
    let mut reader = AlignmentReader::open(alignment_path, metadata, config.strictness)?;

    let table = aggregate_proteins(best_hits(reader.by_ref(), config.input_order, alignment_path), metadata)?;
    let parse_stats = reader.stats().clone();
    info!(
        "Parsed {} alignments ({} malformed, {} unknown proteins skipped)",
        parse_stats.records, parse_stats.malformed_skipped, parse_stats.unknown_protein_skipped
    );
    info!(
        "{} reads assigned to {} proteins",
        table.assigned_reads,
        table.detected_proteins()
    );

    let genomes = rollup_genomes(&table, metadata, &config.inclusion);
    info!("{} genomes retained", genomes.len());

    Ok(SampleSummary {
        proteins: table.ranked(),
        genomes,
        parse_stats,
        assigned_reads: table.assigned_reads,
    })
}
