//! Read counting for sequencing inputs.
//!
//! `needletail` detects FASTQ or FASTA and gzip compression from the file
//! contents, so SRA dumps and compressed uploads are handled alike.

use anyhow::{anyhow, Result};
use log::info;
use needletail::parse_fastx_file;
use std::path::Path;

/// Counts the records in a FASTQ/FASTA file (compressed or uncompressed).
///
/// The count is only reported in the output document; it never feeds into
/// the aggregation.
pub fn count_reads(path: &Path) -> Result<u64> {
    let mut reader = parse_fastx_file(path)
        .map_err(|e| anyhow!("Failed to open or parse file {:?}: {}", path, e))?;

    let mut n_reads = 0u64;
    while let Some(record) = reader.next() {
        record.map_err(|e| anyhow!("Failed to parse record in file {:?}: {}", path, e))?;
        n_reads += 1;
    }

    info!("Reads in input file: {}", n_reads);
    Ok(n_reads)
}
