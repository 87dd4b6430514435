//! Conversion report: per-split counts and per-image issues.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::wider::{Split, SplitTable};

/// A report generated during a WIDER to VOC conversion.
///
/// Records what was read and written for each split, plus every image
/// that could not be converted and every box that had to be adjusted.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Dataset root that was read.
    pub source: PathBuf,
    /// `WIDER/` directory that was written.
    pub output: PathBuf,
    /// Counts per split, in processing order.
    pub splits: Vec<SplitCounts>,
    /// Issues discovered during conversion.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    /// Create a new empty report.
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Seed the counts for a freshly loaded table and note adjusted boxes.
    pub fn record_table(&mut self, table: &SplitTable) {
        let counts = self.counts_mut(table.split);
        counts.events = table.events.len();
        counts.images = table.image_count();
        counts.faces = table.face_count();

        for adjustment in &table.adjustments {
            self.add(ConversionIssue::warning(
                ConversionIssueCode::NegativeBoxSize,
                table.split,
                table.source.clone(),
                format!(
                    "box #{} of '{}' had negative size {:?}; flipped",
                    adjustment.index, adjustment.stem, adjustment.original
                ),
            ));
        }
    }

    /// Counts for `split`, created on first use.
    pub fn counts_mut(&mut self, split: Split) -> &mut SplitCounts {
        match self.splits.iter().position(|counts| counts.split == split) {
            Some(idx) => &mut self.splits[idx],
            None => {
                self.splits.push(SplitCounts::new(split));
                let last = self.splits.len() - 1;
                &mut self.splits[last]
            }
        }
    }

    pub fn counts(&self, split: Split) -> Option<&SplitCounts> {
        self.splits.iter().find(|counts| counts.split == split)
    }

    /// Count of warning-level issues.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of error-level issues (images that failed a stage).
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Error)
            .count()
    }

    /// Returns true if every image made it through every stage.
    pub fn is_complete(&self) -> bool {
        self.error_count() == 0
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for counts in &self.splits {
            writeln!(
                f,
                "  {}: {} events, {} images, {} faces",
                counts.split, counts.events, counts.images, counts.faces
            )?;
            writeln!(
                f,
                "    wrote {} annotations, copied {} images, listed {} images",
                counts.annotations_written, counts.images_copied, counts.manifest_lines
            )?;
        }

        for (severity, title) in [
            (ConversionSeverity::Error, "Errors"),
            (ConversionSeverity::Warning, "Warnings"),
        ] {
            let matching: Vec<_> = self
                .issues
                .iter()
                .filter(|i| i.severity == severity)
                .collect();
            if matching.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{} ({}):", title, matching.len())?;
            for issue in matching {
                writeln!(f, "  - [{}] {}", issue.split, issue.message)?;
            }
        }

        Ok(())
    }
}

/// Counts for one split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub split: Split,
    pub events: usize,
    pub images: usize,
    pub faces: usize,
    pub annotations_written: usize,
    pub images_copied: usize,
    pub manifest_lines: usize,
}

impl SplitCounts {
    pub fn new(split: Split) -> Self {
        Self {
            split,
            events: 0,
            images: 0,
            faces: 0,
            annotations_written: 0,
            images_copied: 0,
            manifest_lines: 0,
        }
    }
}

/// A single issue discovered during conversion.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub split: Split,
    pub path: PathBuf,
    pub message: String,
}

impl ConversionIssue {
    /// Create a warning-level issue (data was adjusted, output still written).
    pub fn warning(
        code: ConversionIssueCode,
        split: Split,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            split,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an error-level issue (an image was skipped by a stage).
    pub fn error(
        code: ConversionIssueCode,
        split: Split,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: ConversionSeverity::Error,
            code,
            split,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Severity level for conversion issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    Warning,
    Error,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON report and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// A box with negative width or height was flipped while loading.
    NegativeBoxSize,
    /// The source image could not be read or decoded; no annotation written.
    UnreadableImage,
    /// The annotation XML could not be written.
    AnnotationWriteFailed,
    /// The source image could not be copied.
    ImageCopyFailed,
}
