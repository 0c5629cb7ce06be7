//! External aligner integration.

use crate::config::AlignerSettings;
use crate::io::alignment::ALIGNMENT_COLUMNS;
use crate::pipeline::PipelineError;
use crate::utils::command;
use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Output columns requested from the aligner, in the order the parser expects.
pub const OUTPUT_FIELDS: [&str; ALIGNMENT_COLUMNS] = [
    "qseqid", "sseqid", "pident", "length", "mismatch", "gapopen", "qstart", "qend", "sstart",
    "send", "evalue", "bitscore",
];

/// Trait for alignment tools
pub trait Aligner: Send + Sync {
    /// Aligns `reads` against `database`, writing into `workdir`, and returns
    /// the path of the tabular alignment file.
    fn align(&self, reads: &Path, database: &Path, workdir: &Path) -> Result<PathBuf, PipelineError>;
}

impl<A: Aligner + ?Sized> Aligner for &A {
    fn align(&self, reads: &Path, database: &Path, workdir: &Path) -> Result<PathBuf, PipelineError> {
        (**self).align(reads, database, workdir)
    }
}

/// DIAMOND `blastx` (translated nucleotide reads against a protein database).
pub struct DiamondAligner {
    settings: AlignerSettings,
}

impl DiamondAligner {
    pub fn new(settings: AlignerSettings) -> Self {
        DiamondAligner { settings }
    }

    /// Path of the alignment file written for `reads` inside `workdir`.
    pub fn output_path(reads: &Path, workdir: &Path) -> PathBuf {
        let stem = reads
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "reads".to_string());
        workdir.join(format!("{}.aln", stem))
    }

    pub fn build_command(&self, reads: &Path, database: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.arg("blastx")
            .arg("--query")
            .arg(reads)
            .arg("--db")
            .arg(database)
            .arg("--out")
            .arg(output)
            .arg("--outfmt")
            .arg("6")
            .args(OUTPUT_FIELDS)
            .arg("--threads")
            .arg(self.settings.threads.to_string())
            .arg("--block-size")
            .arg(self.settings.blocks.to_string())
            .arg("--query-gencode")
            .arg(self.settings.query_gencode.to_string())
            .arg("--max-target-seqs")
            .arg("0");
        cmd
    }
}

impl Aligner for DiamondAligner {
    fn align(&self, reads: &Path, database: &Path, workdir: &Path) -> Result<PathBuf, PipelineError> {
        let output = Self::output_path(reads, workdir);
        info!("Aligning {} against {}", reads.display(), database.display());

        let mut cmd = self.build_command(reads, database, &output);
        command::run(&mut cmd).map_err(PipelineError::AlignmentInvocation)?;

        if !output.is_file() {
            return Err(PipelineError::AlignmentInvocation(format!(
                "aligner finished but {} was not written",
                output.display()
            )));
        }
        info!("Alignment written to {}", output.display());
        Ok(output)
    }
}
