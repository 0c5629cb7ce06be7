//! Reference metadata handling module.
//!
//! This module provides the protein → genome mapping that every sample is
//! summarized against. It is loaded once per run and shared read-only.

use crate::io::open_input;
use crate::pipeline::PipelineError;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Metadata attached to a single reference protein.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinInfo {
    pub genome_id: String,
    /// Protein length in amino acids, when the table provides it
    pub length: Option<u64>,
}

/// A genome: a name and the set of proteins that belong to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeInfo {
    pub genome_id: String,
    pub name: Option<String>,
    /// Protein ids, sorted
    pub proteins: Vec<String>,
}

/// Immutable protein → genome mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceMetadata {
    proteins: HashMap<String, ProteinInfo>,
    genomes: BTreeMap<String, GenomeInfo>,
}

impl ReferenceMetadata {
    /// Builds metadata from `(protein_id, genome_id, genome_name, protein_length)` rows.
    ///
    /// Fails when a protein id appears twice.
    pub fn from_rows<I>(rows: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String, Option<String>, Option<u64>)>,
    {
        let mut metadata = ReferenceMetadata::default();
        for (protein_id, genome_id, name, length) in rows {
            if metadata.proteins.contains_key(&protein_id) {
                return Err(format!("duplicate protein id '{}'", protein_id));
            }
            let genome = metadata
                .genomes
                .entry(genome_id.clone())
                .or_insert_with(|| GenomeInfo {
                    genome_id: genome_id.clone(),
                    name: None,
                    proteins: Vec::new(),
                });
            if genome.name.is_none() {
                genome.name = name;
            }
            genome.proteins.push(protein_id.clone());
            metadata
                .proteins
                .insert(protein_id, ProteinInfo { genome_id, length });
        }
        for genome in metadata.genomes.values_mut() {
            genome.proteins.sort();
        }
        Ok(metadata)
    }

    pub fn protein(&self, protein_id: &str) -> Option<&ProteinInfo> {
        self.proteins.get(protein_id)
    }

    pub fn contains_protein(&self, protein_id: &str) -> bool {
        self.proteins.contains_key(protein_id)
    }

    /// Genomes in ascending `genome_id` order.
    pub fn genomes(&self) -> impl Iterator<Item = &GenomeInfo> {
        self.genomes.values()
    }

    pub fn protein_count(&self) -> usize {
        self.proteins.len()
    }

    pub fn genome_count(&self) -> usize {
        self.genomes.len()
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim();
        names.iter().any(|name| h.eq_ignore_ascii_case(name))
    })
}

/// Loads metadata from a tab-delimited file with a header row (optionally gzipped).
///
/// Required columns are `protein`/`protein_id` and `genome`/`genome_id`;
/// `genome_name`/`name`/`organism` and `length`/`protein_length` are picked up
/// when present. Any problem with this table is fatal for the whole run.
pub fn load_metadata(path: &Path) -> Result<ReferenceMetadata, PipelineError> {
    let reader = open_input(path)
        .map_err(|e| PipelineError::parse(path, format!("cannot open metadata: {}", e)))?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::parse(path, format!("cannot read header: {}", e)))?
        .clone();
    let protein_col = find_column(&headers, &["protein", "protein_id"])
        .ok_or_else(|| PipelineError::parse(path, "missing 'protein' column"))?;
    let genome_col = find_column(&headers, &["genome", "genome_id"])
        .ok_or_else(|| PipelineError::parse(path, "missing 'genome' column"))?;
    let name_col = find_column(&headers, &["genome_name", "name", "organism"]);
    let length_col = find_column(&headers, &["length", "protein_length"]);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| PipelineError::parse(path, format!("bad metadata row: {}", e)))?;
        let line = record.position().map_or(0, |p| p.line());
        let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");

        let protein_id = field(protein_col);
        let genome_id = field(genome_col);
        if protein_id.is_empty() || genome_id.is_empty() {
            return Err(PipelineError::parse(
                path,
                format!("line {}: empty protein or genome id", line),
            ));
        }
        let name = name_col
            .map(field)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let length = match length_col.map(field).filter(|l| !l.is_empty()) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                PipelineError::parse(path, format!("line {}: invalid length '{}'", line, raw))
            })?),
            None => None,
        };
        rows.push((protein_id.to_string(), genome_id.to_string(), name, length));
    }

    let metadata = ReferenceMetadata::from_rows(rows).map_err(|e| PipelineError::parse(path, e))?;
    if metadata.protein_count() == 0 {
        return Err(PipelineError::parse(path, "no proteins found in metadata"));
    }
    info!(
        "Loaded metadata: {} proteins across {} genomes",
        metadata.protein_count(),
        metadata.genome_count()
    );
    Ok(metadata)
}
