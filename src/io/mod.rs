//! Input/Output operations module.
//!
//! Handles reading the aligner's tabular output and sequence files, and
//! delivering the per-sample result documents.

pub mod alignment; // Streaming parser for the aligner's tabular output
pub mod fastq; // Read counting for FASTQ/FASTA inputs
pub mod output; // Result document writing and delivery

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Opens a file for reading, transparently decompressing it when it ends in `.gz`.
pub fn open_input(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_open_input_plain_and_gz() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("table.tsv");
        std::fs::write(&plain, "a\tb\n").unwrap();

        let gz = dir.path().join("table.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"a\tb\n").unwrap();
        encoder.finish().unwrap();

        for path in [&plain, &gz] {
            let mut content = String::new();
            open_input(path).unwrap().read_to_string(&mut content).unwrap();
            assert_eq!(content, "a\tb\n");
        }
    }

    #[test]
    fn test_open_input_missing() {
        assert!(open_input(Path::new("does/not/exist.tsv")).is_err());
    }
}
