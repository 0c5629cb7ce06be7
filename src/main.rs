//! Entry point for map-viruses.
//!
//! Aligns the reads of each input against a viral protein database with
//! DIAMOND, keeps the best hit per read and reports protein abundance and
//! genome coverage as one JSON document per sample.

mod cli;
mod config;
mod database;
mod io;
mod metadata;
mod pipeline;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::{run_cli, Args};
use log::info;

fn main() -> Result<()> {
    let logs = utils::init_logging()?;

    let args = Args::parse();
    info!("Starting map-viruses with arguments: {:?}", args);

    run_cli(args, logs)
}
