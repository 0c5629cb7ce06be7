//! Input file retrieval.
//!
//! Reads, the reference database and the metadata table may live in S3, on an
//! anonymous FTP server, in the Sequence Read Archive, or on local disk. Remote
//! files are copied into a caller-provided directory using the usual command
//! line tools.

use crate::pipeline::PipelineError;
use crate::utils::command;
use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Where a file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    S3(String),
    Ftp(String),
    /// SRA run accession
    Sra(String),
    Local(PathBuf),
}

impl Location {
    pub fn parse(uri: &str) -> Result<Self, PipelineError> {
        if uri.starts_with("s3://") {
            Ok(Location::S3(uri.to_string()))
        } else if uri.starts_with("ftp://") {
            Ok(Location::Ftp(uri.to_string()))
        } else if let Some(accession) = uri.strip_prefix("sra://") {
            if accession.is_empty() || accession.contains('/') {
                return Err(PipelineError::retrieval(uri, "invalid SRA accession"));
            }
            Ok(Location::Sra(accession.to_string()))
        } else if uri.contains("://") {
            Err(PipelineError::retrieval(
                uri,
                "unsupported scheme (expected s3://, ftp://, sra:// or a local path)",
            ))
        } else {
            Ok(Location::Local(PathBuf::from(uri)))
        }
    }
}

/// Last `/`-separated segment of a URI or path.
pub fn file_name(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

/// Fetches a file into a local directory.
pub trait Retrieve: Send + Sync {
    /// Returns a local path for `uri`, copying it into `dest_dir` if it is remote.
    fn fetch(&self, uri: &str, dest_dir: &Path) -> Result<PathBuf, PipelineError>;

    /// Like [`Retrieve::fetch`], but first checks that `uri` ends with `ending`.
    fn fetch_with_ending(
        &self,
        uri: &str,
        dest_dir: &Path,
        ending: &str,
    ) -> Result<PathBuf, PipelineError> {
        if !uri.ends_with(ending) {
            return Err(PipelineError::retrieval(
                uri,
                format!("expected a file ending in '{}'", ending),
            ));
        }
        self.fetch(uri, dest_dir)
    }
}

/// Retrieval through `aws`, `wget` and `fasterq-dump`.
pub struct ToolRetriever {
    pub aws: PathBuf,
    pub wget: PathBuf,
    pub fasterq_dump: PathBuf,
}

impl Default for ToolRetriever {
    fn default() -> Self {
        ToolRetriever {
            aws: PathBuf::from("aws"),
            wget: PathBuf::from("wget"),
            fasterq_dump: PathBuf::from("fasterq-dump"),
        }
    }
}

impl ToolRetriever {
    fn run(&self, uri: &str, cmd: &mut Command) -> Result<(), PipelineError> {
        command::run(cmd).map(|_| ()).map_err(|e| PipelineError::retrieval(uri, e))
    }
}

impl Retrieve for ToolRetriever {
    fn fetch(&self, uri: &str, dest_dir: &Path) -> Result<PathBuf, PipelineError> {
        let local = match Location::parse(uri)? {
            Location::Local(path) => {
                if !path.is_file() {
                    return Err(PipelineError::retrieval(uri, "no such file"));
                }
                info!("Using local file {}", path.display());
                return Ok(path);
            }
            Location::S3(_) => {
                let dest = dest_dir.join(file_name(uri));
                self.run(
                    uri,
                    Command::new(&self.aws)
                        .args(["s3", "cp", "--quiet", uri])
                        .arg(&dest),
                )?;
                dest
            }
            Location::Ftp(_) => {
                let dest = dest_dir.join(file_name(uri));
                self.run(
                    uri,
                    Command::new(&self.wget)
                        .args(["--quiet", "-O"])
                        .arg(&dest)
                        .arg(uri),
                )?;
                dest
            }
            Location::Sra(accession) => {
                self.run(
                    uri,
                    Command::new(&self.fasterq_dump)
                        .arg("--split-spot")
                        .arg("--outdir")
                        .arg(dest_dir)
                        .arg("--temp")
                        .arg(dest_dir)
                        .arg(&accession),
                )?;
                dest_dir.join(format!("{}.fastq", accession))
            }
        };

        match std::fs::metadata(&local) {
            Ok(meta) if meta.len() > 0 => {
                info!("Retrieved {} to {}", uri, local.display());
                Ok(local)
            }
            _ => Err(PipelineError::retrieval(
                uri,
                format!("{} is missing or empty after download", local.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            Location::parse("s3://bucket/reads.fastq.gz").unwrap(),
            Location::S3("s3://bucket/reads.fastq.gz".to_string())
        );
        assert_eq!(
            Location::parse("ftp://ftp.example.org/pub/db.dmnd").unwrap(),
            Location::Ftp("ftp://ftp.example.org/pub/db.dmnd".to_string())
        );
        assert_eq!(
            Location::parse("sra://SRR1234567").unwrap(),
            Location::Sra("SRR1234567".to_string())
        );
        assert_eq!(
            Location::parse("data/reads.fq").unwrap(),
            Location::Local(PathBuf::from("data/reads.fq"))
        );
        assert!(Location::parse("sra://").is_err());
        assert!(Location::parse("https://example.org/x").is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("s3://bucket/path/reads.fastq.gz"), "reads.fastq.gz");
        assert_eq!(file_name("sra://SRR1"), "SRR1");
        assert_eq!(file_name("reads.fq"), "reads.fq");
    }

    #[test]
    fn test_local_fetch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ref.dmnd");
        std::fs::write(&path, b"db").unwrap();
        let uri = path.to_str().unwrap();

        let retriever = ToolRetriever::default();
        assert_eq!(retriever.fetch(uri, dir.path()).unwrap(), path);
        assert_eq!(retriever.fetch_with_ending(uri, dir.path(), ".dmnd").unwrap(), path);

        let err = retriever.fetch_with_ending(uri, dir.path(), ".fasta").unwrap_err();
        assert_eq!(err.stage(), "retrieval");
        assert!(retriever.fetch("missing/file.fq", dir.path()).is_err());
    }

    #[test]
    fn test_remote_fetch_failure_is_retrieval_error() {
        let dir = tempdir().unwrap();
        let retriever = ToolRetriever {
            aws: PathBuf::from("no-such-aws-cli-9913"),
            ..ToolRetriever::default()
        };
        let err = retriever.fetch("s3://bucket/reads.fq", dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval { .. }));
    }
}
