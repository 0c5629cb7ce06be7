//! Genome-level rollup.
//!
//! Joins the protein table against the reference metadata. Every genome in the
//! metadata is evaluated, hit or not; the inclusion policy then decides which
//! rows are kept.

use crate::config::InclusionPolicy;
use crate::metadata::{GenomeInfo, ReferenceMetadata};
use crate::pipeline::abundance::ProteinTable;
use serde::{Deserialize, Serialize};

/// Coverage and abundance of one reference genome in one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeSummary {
    pub genome_id: String,
    pub genome_name: Option<String>,
    pub total_reads: u64,
    pub proteins_detected: usize,
    pub proteins_total: usize,
    /// `proteins_detected / proteins_total`, 0 for a genome without proteins
    pub coverage_fraction: f64,
    /// Read-weighted mean identity of the detected proteins
    pub aggregate_identity: Option<f64>,
    /// Share of all assigned reads in the sample
    pub read_fraction: f64,
    /// Whether the genome passes the inclusion threshold
    pub detected: bool,
}

fn summarize_genome(
    genome: &GenomeInfo,
    proteins: &ProteinTable,
    policy: &InclusionPolicy,
) -> GenomeSummary {
    let mut total_reads = 0u64;
    let mut proteins_detected = 0usize;
    let mut weighted_identity = 0.0;

    for abundance in genome.proteins.iter().filter_map(|p| proteins.get(p)) {
        if abundance.reads == 0 {
            continue;
        }
        total_reads += abundance.reads;
        proteins_detected += 1;
        weighted_identity += abundance.mean_identity * abundance.reads as f64;
    }

    let proteins_total = genome.proteins.len();
    let coverage_fraction = if proteins_total == 0 {
        0.0
    } else {
        proteins_detected as f64 / proteins_total as f64
    };
    let aggregate_identity = (total_reads > 0).then(|| weighted_identity / total_reads as f64);
    let read_fraction = if proteins.assigned_reads == 0 {
        0.0
    } else {
        total_reads as f64 / proteins.assigned_reads as f64
    };

    GenomeSummary {
        genome_id: genome.genome_id.clone(),
        genome_name: genome.name.clone(),
        total_reads,
        proteins_detected,
        proteins_total,
        coverage_fraction,
        aggregate_identity,
        read_fraction,
        detected: total_reads >= policy.min_reads
            && proteins_detected >= policy.min_proteins_detected
            && total_reads > 0,
    }
}

/// Rolls protein abundance up to genomes.
///
/// Returns the retained rows sorted by `total_reads` descending, ties broken by
/// `genome_id` ascending.
pub fn rollup_genomes(
    proteins: &ProteinTable,
    metadata: &ReferenceMetadata,
    policy: &InclusionPolicy,
) -> Vec<GenomeSummary> {
    let mut genomes: Vec<GenomeSummary> = metadata
        .genomes()
        .map(|genome| summarize_genome(genome, proteins, policy))
        .filter(|summary| policy.report_all_genomes || summary.detected)
        .collect();

    genomes.sort_by(|a, b| {
        b.total_reads
            .cmp(&a.total_reads)
            .then_with(|| a.genome_id.cmp(&b.genome_id))
    });
    genomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::alignment::AlignmentRecord;
    use crate::pipeline::abundance::aggregate_proteins;
    use crate::pipeline::reducer::ReadAssignment;
    use approx::assert_relative_eq;

    fn metadata() -> ReferenceMetadata {
        let rows = [("P1", "G1"), ("P2", "G1"), ("P3", "G2"), ("P4", "G3"), ("P5", "G3")];
        ReferenceMetadata::from_rows(
            rows.iter()
                .map(|(p, g)| (p.to_string(), g.to_string(), Some(format!("{} virus", g)), None)),
        )
        .unwrap()
    }

    fn table(hits: &[(&str, &str, f64)], metadata: &ReferenceMetadata) -> ProteinTable {
        let assignments = hits.iter().map(|&(read, protein, identity)| {
            Ok(ReadAssignment {
                read_id: read.to_string(),
                best: AlignmentRecord {
                    read_id: read.to_string(),
                    protein_id: protein.to_string(),
                    identity,
                    alignment_length: 20,
                    mismatches: 0,
                    gap_opens: 0,
                    query_start: 1,
                    query_end: 60,
                    subject_start: 1,
                    subject_end: 20,
                    e_value: 1e-5,
                    bit_score: 40.0,
                },
                candidates: 1,
            })
        });
        aggregate_proteins(assignments, metadata).unwrap()
    }

    #[test]
    fn test_rollup_counts_and_order() {
        let metadata = metadata();
        let proteins = table(
            &[("r1", "P1", 1.0), ("r2", "P1", 0.8), ("r3", "P4", 0.9), ("r4", "P5", 0.7), ("r5", "P2", 0.6)],
            &metadata,
        );
        let genomes = rollup_genomes(&proteins, &metadata, &InclusionPolicy::default());

        let ids: Vec<_> = genomes.iter().map(|g| g.genome_id.as_str()).collect();
        // G2 has no reads and is dropped under the default policy
        assert_eq!(ids, vec!["G1", "G3"]);

        let g1 = &genomes[0];
        assert_eq!(g1.total_reads, 3);
        assert_eq!(g1.proteins_detected, 2);
        assert_eq!(g1.proteins_total, 2);
        assert_relative_eq!(g1.coverage_fraction, 1.0);
        // P1 mean 0.9 over 2 reads, P2 0.6 over 1 read
        assert_relative_eq!(g1.aggregate_identity.unwrap(), (0.9 * 2.0 + 0.6) / 3.0);
        assert_relative_eq!(g1.read_fraction, 0.6);
        assert_eq!(g1.genome_name.as_deref(), Some("G1 virus"));
        assert!(g1.detected);
    }

    #[test]
    fn test_ties_broken_by_genome_id() {
        let metadata = metadata();
        let proteins = table(&[("r1", "P4", 1.0), ("r2", "P3", 1.0)], &metadata);
        let genomes = rollup_genomes(&proteins, &metadata, &InclusionPolicy::default());
        let ids: Vec<_> = genomes.iter().map(|g| g.genome_id.as_str()).collect();
        assert_eq!(ids, vec!["G2", "G3"]);
    }

    #[test]
    fn test_report_all_genomes_includes_zero_hits() {
        let metadata = metadata();
        let proteins = table(&[("r1", "P1", 1.0)], &metadata);
        let policy = InclusionPolicy {
            report_all_genomes: true,
            ..InclusionPolicy::default()
        };
        let genomes = rollup_genomes(&proteins, &metadata, &policy);
        assert_eq!(genomes.len(), 3);

        for genome in &genomes {
            assert!((0.0..=1.0).contains(&genome.coverage_fraction));
            assert_eq!(genome.coverage_fraction == 0.0, genome.proteins_detected == 0);
            if !genome.detected {
                assert_eq!(genome.total_reads, 0);
                assert_eq!(genome.aggregate_identity, None);
            }
        }
        assert_eq!(genomes[1].genome_id, "G2");
        assert_eq!(genomes[2].genome_id, "G3");
    }

    #[test]
    fn test_thresholds() {
        let metadata = metadata();
        let proteins = table(&[("r1", "P1", 1.0), ("r2", "P1", 1.0), ("r3", "P3", 1.0)], &metadata);

        let policy = InclusionPolicy {
            min_reads: 2,
            ..InclusionPolicy::default()
        };
        let genomes = rollup_genomes(&proteins, &metadata, &policy);
        assert_eq!(genomes.len(), 1);
        assert_eq!(genomes[0].genome_id, "G1");

        let policy = InclusionPolicy {
            min_proteins_detected: 2,
            report_all_genomes: true,
            ..InclusionPolicy::default()
        };
        let genomes = rollup_genomes(&proteins, &metadata, &policy);
        assert_eq!(genomes.len(), 3);
        assert!(genomes.iter().all(|g| !g.detected));
    }

    #[test]
    fn test_genome_without_proteins_has_zero_coverage() {
        let genome = GenomeInfo {
            genome_id: "G0".to_string(),
            name: None,
            proteins: Vec::new(),
        };
        let summary = summarize_genome(&genome, &ProteinTable::default(), &InclusionPolicy::default());
        assert_eq!(summary.coverage_fraction, 0.0);
        assert!(!summary.detected);
    }
}
