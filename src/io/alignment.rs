//! Alignment table parser.
//!
//! Reads the aligner's tabular output (BLAST tabular format 6, 12 columns)
//! one line at a time and yields typed [`AlignmentRecord`]s.
//!
//! ```text
//! Col  Field       Description
//! 1    qseqid      Read id
//! 2    sseqid      Protein id
//! 3    pident      Percent identity (0-100)
//! 4    length      Alignment length
//! 5    mismatch    Number of mismatches
//! 6    gapopen     Number of gap openings
//! 7    qstart      Query start (1-based)
//! 8    qend        Query end
//! 9    sstart      Subject start (1-based)
//! 10   send        Subject end
//! 11   evalue      Expect value
//! 12   bitscore    Bit score
//! ```

use crate::config::Strictness;
use crate::io::open_input;
use crate::metadata::ReferenceMetadata;
use crate::pipeline::PipelineError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Number of columns the aligner is asked to write.
pub const ALIGNMENT_COLUMNS: usize = 12;

/// One row of aligner output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub read_id: String,
    pub protein_id: String,
    /// Fraction of identical positions, in [0, 1]
    pub identity: f64,
    pub alignment_length: u64,
    pub mismatches: u64,
    pub gap_opens: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub subject_start: u64,
    pub subject_end: u64,
    pub e_value: f64,
    pub bit_score: f64,
}

fn parse_field<T: FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {} '{}'", name, value))
}

impl AlignmentRecord {
    /// Parses and validates the fields of a single row.
    pub fn from_fields(fields: &csv::StringRecord) -> Result<Self, String> {
        if fields.len() != ALIGNMENT_COLUMNS {
            return Err(format!(
                "expected {} fields, found {}",
                ALIGNMENT_COLUMNS,
                fields.len()
            ));
        }

        let read_id = fields[0].trim();
        let protein_id = fields[1].trim();
        if read_id.is_empty() || protein_id.is_empty() {
            return Err("empty read or protein id".to_string());
        }

        let percent_identity: f64 = parse_field(&fields[2], "identity")?;
        if !(0.0..=100.0).contains(&percent_identity) {
            return Err(format!("identity {} outside 0-100", percent_identity));
        }
        let alignment_length: u64 = parse_field(&fields[3], "alignment length")?;
        if alignment_length == 0 {
            return Err("alignment length must be positive".to_string());
        }
        let query_start: u64 = parse_field(&fields[6], "query start")?;
        let query_end: u64 = parse_field(&fields[7], "query end")?;
        let subject_start: u64 = parse_field(&fields[8], "subject start")?;
        let subject_end: u64 = parse_field(&fields[9], "subject end")?;
        if query_start == 0 || query_end == 0 || subject_start == 0 {
            return Err("positions are 1-based".to_string());
        }
        if subject_end < subject_start {
            return Err(format!(
                "subject end {} before subject start {}",
                subject_end, subject_start
            ));
        }
        let e_value: f64 = parse_field(&fields[10], "e-value")?;
        if e_value.is_nan() || e_value < 0.0 {
            return Err(format!("invalid e-value {}", e_value));
        }
        let bit_score: f64 = parse_field(&fields[11], "bit score")?;
        if !bit_score.is_finite() {
            return Err(format!("invalid bit score {}", bit_score));
        }

        Ok(AlignmentRecord {
            read_id: read_id.to_string(),
            protein_id: protein_id.to_string(),
            identity: percent_identity / 100.0,
            alignment_length,
            mismatches: parse_field(&fields[4], "mismatches")?,
            gap_opens: parse_field(&fields[5], "gap opens")?,
            query_start,
            query_end,
            subject_start,
            subject_end,
            e_value,
            bit_score,
        })
    }
}

/// Counters describing what the parser saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Non-empty lines read
    pub lines: u64,
    /// Records handed downstream
    pub records: u64,
    /// Rows skipped because they could not be parsed
    pub malformed_skipped: u64,
    /// Rows skipped because their protein is not in the metadata
    pub unknown_protein_skipped: u64,
}

/// Streaming reader over an alignment table.
///
/// Every record it yields references a protein present in `metadata`. Bad rows
/// are skipped or reported according to `strictness`; once an error has been
/// yielded the iterator is exhausted.
pub struct AlignmentReader<'m> {
    path: PathBuf,
    records: csv::StringRecordsIntoIter<Box<dyn Read>>,
    metadata: &'m ReferenceMetadata,
    strictness: Strictness,
    stats: ParseStats,
    finished: bool,
}

impl<'m> AlignmentReader<'m> {
    /// Opens an alignment table (plain or gzipped) for reading.
    pub fn open(
        path: &Path,
        metadata: &'m ReferenceMetadata,
        strictness: Strictness,
    ) -> Result<Self, PipelineError> {
        let reader = open_input(path)
            .map_err(|e| PipelineError::parse(path, format!("cannot open alignments: {}", e)))?;
        let records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader)
            .into_records();
        Ok(AlignmentReader {
            path: path.to_path_buf(),
            records,
            metadata,
            strictness,
            stats: ParseStats::default(),
            finished: false,
        })
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    fn fail(&mut self, err: PipelineError) -> Option<Result<AlignmentRecord, PipelineError>> {
        self.finished = true;
        Some(Err(err))
    }

    /// Handles a row that could not be parsed. Returns an error only in strict mode.
    fn reject_malformed(&mut self, line: u64, reason: String) -> Option<PipelineError> {
        match self.strictness {
            Strictness::Strict => Some(PipelineError::parse(
                &self.path,
                format!("line {}: {}", line, reason),
            )),
            Strictness::Lenient => {
                warn!("Skipping malformed alignment at line {}: {}", line, reason);
                self.stats.malformed_skipped += 1;
                None
            }
        }
    }
}

impl Iterator for AlignmentReader<'_> {
    type Item = Result<AlignmentRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let row = match self.records.next() {
                Some(row) => row,
                None => {
                    self.finished = true;
                    if self.stats.records == 0 {
                        return Some(Err(PipelineError::parse(
                            &self.path,
                            format!(
                                "no valid alignment records ({} lines read)",
                                self.stats.lines
                            ),
                        )));
                    }
                    return None;
                }
            };

            let fields = match row {
                Ok(fields) => fields,
                Err(e) if e.is_io_error() => {
                    let err = PipelineError::parse(&self.path, e.to_string());
                    return self.fail(err);
                }
                Err(e) => {
                    self.stats.lines += 1;
                    let line = e.position().map_or(0, |p| p.line());
                    match self.reject_malformed(line, e.to_string()) {
                        Some(err) => return self.fail(err),
                        None => continue,
                    }
                }
            };

            if fields.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            self.stats.lines += 1;
            let line = fields.position().map_or(0, |p| p.line());

            let record = match AlignmentRecord::from_fields(&fields) {
                Ok(record) => record,
                Err(reason) => match self.reject_malformed(line, reason) {
                    Some(err) => return self.fail(err),
                    None => continue,
                },
            };

            if !self.metadata.contains_protein(&record.protein_id) {
                match self.strictness {
                    Strictness::Strict => {
                        return self.fail(PipelineError::AggregationInconsistency {
                            protein_id: record.protein_id,
                            line,
                        });
                    }
                    Strictness::Lenient => {
                        warn!(
                            "Skipping alignment to unknown protein '{}' at line {}",
                            record.protein_id, line
                        );
                        self.stats.unknown_protein_skipped += 1;
                        continue;
                    }
                }
            }

            self.stats.records += 1;
            return Some(Ok(record));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    fn metadata() -> ReferenceMetadata {
        ReferenceMetadata::from_rows(vec![
            ("P1".to_string(), "G1".to_string(), None, Some(100)),
            ("P2".to_string(), "G1".to_string(), None, Some(200)),
        ])
        .unwrap()
    }

    fn write_table(content: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.aln");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    const GOOD: &str = "r1\tP1\t95.5\t30\t1\t0\t1\t90\t10\t39\t1e-10\t55.1\n";

    #[test]
    fn test_parse_single_record() {
        let (_dir, path) = write_table(GOOD);
        let metadata = metadata();
        let mut reader = AlignmentReader::open(&path, &metadata, Strictness::Strict).unwrap();

        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.read_id, "r1");
        assert_eq!(record.protein_id, "P1");
        approx::assert_relative_eq!(record.identity, 0.955);
        assert_eq!(record.alignment_length, 30);
        assert_eq!(record.subject_start, 10);
        assert_eq!(record.subject_end, 39);
        approx::assert_relative_eq!(record.e_value, 1e-10);
        approx::assert_relative_eq!(record.bit_score, 55.1);
        assert!(reader.next().is_none());
        assert_eq!(reader.stats().records, 1);
    }

    #[test]
    fn test_reverse_frame_query_positions_accepted() {
        let (_dir, path) = write_table("r1\tP1\t80\t30\t1\t0\t90\t1\t10\t39\t1e-5\t40\n");
        let metadata = metadata();
        let records: Vec<_> = AlignmentReader::open(&path, &metadata, Strictness::Strict)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records[0].query_start, 90);
        assert_eq!(records[0].query_end, 1);
    }

    #[test]
    fn test_gzipped_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.aln.gz");
        let mut encoder =
            GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        encoder.write_all(GOOD.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let metadata = metadata();
        let records: Vec<_> = AlignmentReader::open(&path, &metadata, Strictness::Strict)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_strict_aborts_on_malformed_row() {
        let (_dir, path) = write_table(&format!("{}r2\tP1\tnotanumber\n", GOOD));
        let metadata = metadata();
        let mut reader = AlignmentReader::open(&path, &metadata, Strictness::Strict).unwrap();

        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(err.to_string().contains("line 2"));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_lenient_skips_and_counts() {
        let content = format!(
            "{}r2\tP1\t95\t30\n\nr3\tP9\t90\t30\t1\t0\t1\t90\t1\t30\t1e-3\t20\nr4\tP2\t90\t30\t1\t0\t1\t90\t50\t10\t1e-3\t20\n",
            GOOD
        );
        let (_dir, path) = write_table(&content);
        let metadata = metadata();
        let mut reader = AlignmentReader::open(&path, &metadata, Strictness::Lenient).unwrap();

        let records: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            reader.stats(),
            &ParseStats {
                lines: 4,
                records: 1,
                malformed_skipped: 2,
                unknown_protein_skipped: 1,
            }
        );
    }

    #[test]
    fn test_strict_unknown_protein_is_inconsistency() {
        let (_dir, path) = write_table("r3\tP9\t90\t30\t1\t0\t1\t90\t1\t30\t1e-3\t20\n");
        let metadata = metadata();
        let err = AlignmentReader::open(&path, &metadata, Strictness::Strict)
            .unwrap()
            .next()
            .unwrap()
            .unwrap_err();
        match err {
            PipelineError::AggregationInconsistency { protein_id, line } => {
                assert_eq!(protein_id, "P9");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_file_is_error() {
        let (_dir, path) = write_table("");
        let metadata = metadata();
        let mut reader = AlignmentReader::open(&path, &metadata, Strictness::Lenient).unwrap();
        assert!(matches!(reader.next(), Some(Err(PipelineError::Parse { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_entirely_malformed_file_is_error() {
        let (_dir, path) = write_table("garbage\nmore garbage\n");
        let metadata = metadata();
        let result: Result<Vec<_>, _> =
            AlignmentReader::open(&path, &metadata, Strictness::Lenient)
                .unwrap()
                .collect();
        assert!(result.unwrap_err().to_string().contains("no valid alignment records"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let metadata = metadata();
        let result = AlignmentReader::open(Path::new("missing.aln"), &metadata, Strictness::Strict);
        assert!(matches!(result, Err(PipelineError::Parse { .. })));
    }

    #[test]
    fn test_field_validation() {
        let row = |s: &str| csv::StringRecord::from(s.split('\t').collect::<Vec<_>>());
        assert!(AlignmentRecord::from_fields(&row(GOOD.trim_end())).is_ok());
        assert!(AlignmentRecord::from_fields(&row(
            "r1\tP1\t101\t30\t1\t0\t1\t90\t10\t39\t1e-10\t55"
        ))
        .is_err());
        assert!(AlignmentRecord::from_fields(&row(
            "r1\tP1\t90\t0\t1\t0\t1\t90\t10\t39\t1e-10\t55"
        ))
        .is_err());
        assert!(AlignmentRecord::from_fields(&row(
            "r1\tP1\t90\t30\t1\t0\t1\t90\t10\t39\t-1\t55"
        ))
        .is_err());
        assert!(AlignmentRecord::from_fields(&row(
            "\tP1\t90\t30\t1\t0\t1\t90\t10\t39\t1e-3\t55"
        ))
        .is_err());
    }
}
