//! Per-sample result document.

use crate::config::PipelineConfig;
use crate::io::alignment::ParseStats;
use crate::pipeline::abundance::ProteinAbundance;
use crate::pipeline::rollup::GenomeSummary;
use serde::{Deserialize, Serialize};

/// Protein and genome tables of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResults {
    pub proteins: Vec<ProteinAbundance>,
    pub genomes: Vec<GenomeSummary>,
}

/// The JSON document written for every processed sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    /// Input as given on the command line
    pub input_path: String,
    /// File name of the input
    pub input: String,
    pub output_folder: String,
    /// Local path of the reference database used for alignment
    pub ref_db: String,
    pub ref_db_url: String,
    pub metadata_url: String,
    pub results: SampleResults,
    pub parse_summary: ParseStats,
    pub assigned_reads: u64,
    pub total_reads: u64,
    /// Wall-clock seconds spent on this sample
    pub time_elapsed: f64,
    pub settings: PipelineConfig,
    pub logs: Vec<String>,
}

/// Number of genomes listed in the text summary.
const SUMMARY_GENOMES: usize = 10;

/// Short plain-text summary of a report, for the log.
pub fn generate_report(report: &SampleReport) -> String {
    let mut text = String::new();

    text.push_str(&format!("Viral genome summary for {}\n", report.input));
    text.push_str("=================================================\n");
    text.push_str(&format!("  Total reads: {}\n", report.total_reads));
    text.push_str(&format!(
        "  Reads assigned: {} ({:.2}%)\n",
        report.assigned_reads,
        100.0 * report.assigned_reads as f64 / report.total_reads.max(1) as f64
    ));
    text.push_str(&format!(
        "  Proteins detected: {}\n",
        report.results.proteins.len()
    ));
    text.push_str(&format!(
        "  Processing time: {:.2} seconds\n",
        report.time_elapsed
    ));

    let detected: Vec<&GenomeSummary> = report
        .results
        .genomes
        .iter()
        .filter(|g| g.detected)
        .collect();
    if detected.is_empty() {
        text.push_str("\nNo genomes detected.\n");
        return text;
    }

    text.push_str(&format!("\nTop genomes ({} detected):\n", detected.len()));
    for genome in detected.iter().take(SUMMARY_GENOMES) {
        text.push_str(&format!(
            "  {:<24} {:>8} reads  {:>3}/{:<3} proteins  {:.1}% identity  {}\n",
            genome.genome_id,
            genome.total_reads,
            genome.proteins_detected,
            genome.proteins_total,
            100.0 * genome.aggregate_identity.unwrap_or(0.0),
            genome.genome_name.as_deref().unwrap_or("")
        ));
    }
    if detected.len() > SUMMARY_GENOMES {
        text.push_str(&format!(
            "  ... {} more\n",
            detected.len() - SUMMARY_GENOMES
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genome(id: &str, reads: u64, detected: bool) -> GenomeSummary {
        GenomeSummary {
            genome_id: id.to_string(),
            genome_name: Some(format!("{} virus", id)),
            total_reads: reads,
            proteins_detected: if reads > 0 { 1 } else { 0 },
            proteins_total: 2,
            coverage_fraction: if reads > 0 { 0.5 } else { 0.0 },
            aggregate_identity: (reads > 0).then_some(0.95),
            read_fraction: 0.0,
            detected,
        }
    }

    fn report(genomes: Vec<GenomeSummary>) -> SampleReport {
        SampleReport {
            input_path: "s3://bucket/reads.fastq.gz".to_string(),
            input: "reads.fastq.gz".to_string(),
            output_folder: "results".to_string(),
            ref_db: "/tmp/ref.dmnd".to_string(),
            ref_db_url: "s3://bucket/ref.dmnd".to_string(),
            metadata_url: "s3://bucket/ref.tsv".to_string(),
            results: SampleResults {
                proteins: Vec::new(),
                genomes,
            },
            parse_summary: ParseStats::default(),
            assigned_reads: 5,
            total_reads: 20,
            time_elapsed: 1.5,
            settings: PipelineConfig::default(),
            logs: vec!["line".to_string()],
        }
    }

    #[test]
    fn test_generate_report_lists_detected_genomes() {
        let text = generate_report(&report(vec![genome("G1", 5, true), genome("G2", 0, false)]));
        assert!(text.contains("reads.fastq.gz"));
        assert!(text.contains("Reads assigned: 5 (25.00%)"));
        assert!(text.contains("G1"));
        assert!(!text.contains("G2"));
    }

    #[test]
    fn test_generate_report_without_genomes() {
        let text = generate_report(&report(Vec::new()));
        assert!(text.contains("No genomes detected."));
    }

    #[test]
    fn test_document_field_names() {
        let value = serde_json::to_value(report(vec![genome("G1", 5, true)])).unwrap();
        for key in [
            "input_path",
            "input",
            "output_folder",
            "ref_db",
            "ref_db_url",
            "metadata_url",
            "results",
            "parse_summary",
            "assigned_reads",
            "total_reads",
            "time_elapsed",
            "settings",
            "logs",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(value["results"]["genomes"][0]["genome_id"], "G1");
    }
}
