//! wider2voc: convert WIDER Face annotations into a Pascal VOC layout.
//!
//! The WIDER Face dataset ships its boxes as one MATLAB table per split.
//! This crate reads those tables and writes the layout most detection
//! tooling expects from a VOC-style dataset:
//!
//! ```text
//! {target}/WIDER/Annotations/{stem}.xml
//! {target}/WIDER/JPEGImages/{stem}.jpg
//! {target}/WIDER/ImageSets/{split}.txt
//! ```
//!
//! # Modules
//!
//! - [`mat`]: MATLAB Level 5 MAT-file reader
//! - [`wider`]: split tables (events, images, face boxes)
//! - [`bbox`]: flat and corner box forms
//! - [`voc`]: VOC annotation documents
//! - [`convert`]: the conversion stages and their report
//! - [`error`]: error types for wider2voc operations

pub mod bbox;
pub mod convert;
pub mod error;
pub mod mat;
pub mod voc;
pub mod wider;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::info;

pub use convert::{convert_wider_to_voc, ConversionReport, ConvertOptions};
pub use error::WiderError;
pub use wider::Split;

/// The wider2voc CLI application.
#[derive(Parser)]
#[command(name = "wider2voc")]
#[command(version, about)]
struct Cli {
    /// WIDER Face root (holds wider_face_split/ and WIDER_{split}/).
    #[arg(long, short = 's', env = "WIDER_SOURCE", default_value = "dataset/wider")]
    source: PathBuf,

    /// Output root; the VOC tree is written under <TARGET>/WIDER.
    #[arg(long, short = 't', env = "WIDER_TARGET", default_value = "dataset/wider_pascal")]
    target: PathBuf,

    /// Split to convert; repeat for several (default: train, then val).
    #[arg(long = "split", value_enum)]
    splits: Vec<Split>,

    /// Abort on the first image that fails instead of skipping it.
    #[arg(long)]
    fail_fast: bool,

    /// Output format for the report.
    #[arg(long, value_enum, default_value = "text")]
    report: ReportFormat,

    /// Do not draw progress bars.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum ReportFormat {
    Text,
    Json,
}

/// Run the wider2voc CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), WiderError> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = ConvertOptions {
        splits: requested_splits(&cli.splits),
        fail_fast: cli.fail_fast,
        show_progress: !cli.no_progress,
    };

    info!(
        "Converting {} -> {}",
        cli.source.display(),
        cli.target.display()
    );
    let report = convert_wider_to_voc(&cli.source, &cli.target, &options)?;

    match cli.report {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => {
            println!("Conversion summary:");
            print!("{}", report);
        }
    }

    if !report.is_complete() {
        return Err(WiderError::ConversionIncomplete {
            failed: report.error_count(),
        });
    }

    if cli.report == ReportFormat::Text {
        println!(
            "PASCAL VOC format WIDER dataset at {}",
            cli.target.display()
        );
    }
    Ok(())
}

// Duplicates are dropped; first occurrence wins.
fn requested_splits(requested: &[Split]) -> Vec<Split> {
    if requested.is_empty() {
        return Split::ALL.to_vec();
    }
    let mut splits = Vec::with_capacity(requested.len());
    for split in requested {
        if !splits.contains(split) {
            splits.push(*split);
        }
    }
    splits
}
