//! Result documents: serialization and delivery to the output folder.

use crate::pipeline::PipelineError;
use crate::utils::command;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Serializes `document` as JSON, gzip-compressed when `path` ends in `.gz`.
pub fn write_document<T: Serialize>(document: &T, path: &Path) -> Result<(), PipelineError> {
    let file = File::create(path)?;
    let to_output = |e: serde_json::Error| PipelineError::Output(format!("JSON encoding failed: {}", e));

    if path.extension().map_or(false, |ext| ext == "gz") {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, document).map_err(to_output)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document).map_err(to_output)?;
        writer.flush()?;
    }
    Ok(())
}

/// Whether an `aws s3 ls` listing has an object named exactly `name`.
///
/// The listing matches by key prefix, so `name.bak` shows up when asking
/// for `name`.
fn listing_contains(listing: &str, name: &str) -> bool {
    listing.lines().any(|line| {
        line.trim_end()
            .strip_suffix(name)
            .map_or(false, |rest| rest.ends_with(char::is_whitespace))
    })
}

/// Folder that receives finished documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    S3 { prefix: String, aws: PathBuf },
    Local(PathBuf),
}

impl Destination {
    pub fn parse(uri: &str) -> Result<Self, PipelineError> {
        if uri.starts_with("s3://") {
            Ok(Destination::S3 {
                prefix: uri.trim_end_matches('/').to_string(),
                aws: PathBuf::from("aws"),
            })
        } else if uri.contains("://") {
            Err(PipelineError::Output(format!(
                "unsupported output folder '{}' (expected s3:// or a local path)",
                uri
            )))
        } else {
            Ok(Destination::Local(PathBuf::from(uri)))
        }
    }

    /// The folder itself, as given on the command line.
    pub fn uri(&self) -> String {
        match self {
            Destination::S3 { prefix, .. } => prefix.clone(),
            Destination::Local(folder) => folder.display().to_string(),
        }
    }

    /// Full location of `name` inside this destination.
    pub fn location_of(&self, name: &str) -> String {
        match self {
            Destination::S3 { prefix, .. } => format!("{}/{}", prefix, name),
            Destination::Local(folder) => folder.join(name).display().to_string(),
        }
    }

    pub fn exists(&self, name: &str) -> Result<bool, PipelineError> {
        match self {
            Destination::Local(folder) => Ok(folder.join(name).exists()),
            Destination::S3 { aws, .. } => {
                let location = self.location_of(name);
                let output = Command::new(aws)
                    .args(["s3", "ls", location.as_str()])
                    .output()
                    .map_err(|e| PipelineError::Output(format!("failed to run aws: {}", e)))?;
                Ok(output.status.success()
                    && listing_contains(&String::from_utf8_lossy(&output.stdout), name))
            }
        }
    }

    /// Copies a finished local file into the destination under `name`.
    ///
    /// Local copies go through a temporary name and are renamed into place, so
    /// a partially written document is never visible.
    pub fn deliver(&self, local: &Path, name: &str) -> Result<String, PipelineError> {
        let location = self.location_of(name);
        match self {
            Destination::Local(folder) => {
                fs::create_dir_all(folder)?;
                let partial = folder.join(format!(".{}.partial", name));
                fs::copy(local, &partial)?;
                fs::rename(&partial, folder.join(name))?;
            }
            Destination::S3 { aws, .. } => {
                let mut cmd = Command::new(aws);
                cmd.args(["s3", "cp", "--quiet"]).arg(local).arg(&location);
                command::run(&mut cmd).map_err(PipelineError::Output)?;
            }
        }
        info!("Wrote results to {}", location);
        Ok(location)
    }
}
