//! Protein-level abundance.
//!
//! Accumulates read assignments per protein: read count, identity weighted by
//! alignment length, aligned bases, and the union of aligned subject spans.

use crate::metadata::ReferenceMetadata;
use crate::pipeline::reducer::ReadAssignment;
use crate::pipeline::PipelineError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Finalized statistics for one protein with at least one assigned read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinAbundance {
    pub protein_id: String,
    pub genome_id: String,
    pub reads: u64,
    /// Mean identity of assigned alignments, weighted by alignment length
    pub mean_identity: f64,
    /// Sum of alignment lengths
    pub aligned_bases: u64,
    /// Number of protein positions covered by at least one alignment
    pub covered_positions: u64,
    pub protein_length: Option<u64>,
    /// `covered_positions / protein_length`, capped at 1
    pub coverage: Option<f64>,
    /// `aligned_bases / protein_length`
    pub depth: Option<f64>,
}

#[derive(Debug, Default)]
struct ProteinAccumulator {
    reads: u64,
    weighted_identity: f64,
    aligned_bases: u64,
    spans: Vec<(u64, u64)>,
}

/// Size of the union of 1-based inclusive spans.
fn covered_positions(spans: &mut [(u64, u64)]) -> u64 {
    spans.sort_unstable();
    let mut covered = 0;
    let mut current: Option<(u64, u64)> = None;
    for &(start, end) in spans.iter() {
        current = match current {
            Some((cur_start, cur_end)) if start <= cur_end.saturating_add(1) => Some((cur_start, cur_end.max(end))),
            Some((cur_start, cur_end)) => {
                covered = span_add(covered, cur_start, cur_end);
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cur_start, cur_end)) = current {
        covered = span_add(covered, cur_start, cur_end);
    }
    covered
}

/// Adds the length of an inclusive span, saturating at `u64::MAX`.
fn span_add(covered: u64, start: u64, end: u64) -> u64 {
    covered.saturating_add((end - start).saturating_add(1))
}

/// Per-protein abundance for one sample, keyed by protein id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProteinTable {
    proteins: BTreeMap<String, ProteinAbundance>,
    /// Total number of reads assigned to any protein
    pub assigned_reads: u64,
}

impl ProteinTable {
    pub fn get(&self, protein_id: &str) -> Option<&ProteinAbundance> {
        self.proteins.get(protein_id)
    }

    /// Number of proteins with at least one read.
    pub fn detected_proteins(&self) -> usize {
        self.proteins.len()
    }

    /// Rows for reporting: most reads first, ties by protein id.
    pub fn ranked(&self) -> Vec<ProteinAbundance> {
        self.proteins
            .values()
            .sorted_by(|a, b| b.reads.cmp(&a.reads).then_with(|| a.protein_id.cmp(&b.protein_id)))
            .cloned()
            .collect()
    }
}

/// Accumulates read assignments into a [`ProteinTable`].
pub struct ProteinAbundanceAggregator<'m> {
    metadata: &'m ReferenceMetadata,
    proteins: HashMap<String, ProteinAccumulator>,
    assigned_reads: u64,
}

impl<'m> ProteinAbundanceAggregator<'m> {
    pub fn new(metadata: &'m ReferenceMetadata) -> Self {
        ProteinAbundanceAggregator {
            metadata,
            proteins: HashMap::new(),
            assigned_reads: 0,
        }
    }

    pub fn add(&mut self, assignment: ReadAssignment) -> Result<(), PipelineError> {
        let hit = assignment.best;
        if !self.metadata.contains_protein(&hit.protein_id) {
            return Err(PipelineError::AggregationInconsistency {
                protein_id: hit.protein_id,
                line: 0,
            });
        }

        let acc = self.proteins.entry(hit.protein_id).or_default();
        acc.reads += 1;
        acc.weighted_identity += hit.identity * hit.alignment_length as f64;
        acc.aligned_bases += hit.alignment_length;
        acc.spans.push((hit.subject_start, hit.subject_end));
        self.assigned_reads += 1;
        Ok(())
    }

    pub fn finish(self) -> ProteinTable {
        let metadata = self.metadata;
        let proteins = self
            .proteins
            .into_iter()
            .filter_map(|(protein_id, mut acc)| {
                let info = metadata.protein(&protein_id)?;
                let covered = covered_positions(&mut acc.spans);
                let length = info.length.filter(|&l| l > 0);
                let abundance = ProteinAbundance {
                    genome_id: info.genome_id.clone(),
                    reads: acc.reads,
                    mean_identity: acc.weighted_identity / acc.aligned_bases as f64,
                    aligned_bases: acc.aligned_bases,
                    covered_positions: covered,
                    protein_length: info.length,
                    coverage: length.map(|l| (covered as f64 / l as f64).min(1.0)),
                    depth: length.map(|l| acc.aligned_bases as f64 / l as f64),
                    protein_id: protein_id.clone(),
                };
                Some((protein_id, abundance))
            })
            .collect();

        ProteinTable {
            proteins,
            assigned_reads: self.assigned_reads,
        }
    }
}

/// Consumes an assignment stream and returns the finalized protein table.
pub fn aggregate_proteins<I>(
    assignments: I,
    metadata: &ReferenceMetadata,
) -> Result<ProteinTable, PipelineError>
where
    I: IntoIterator<Item = Result<ReadAssignment, PipelineError>>,
{
    let mut aggregator = ProteinAbundanceAggregator::new(metadata);
    for assignment in assignments {
        aggregator.add(assignment?)?;
    }
    Ok(aggregator.finish())
}
