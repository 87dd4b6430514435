//! WIDER Face to Pascal VOC conversion pipeline.
//!
//! Three stages run per split, stage-major across splits:
//!
//! 1. annotations: one `Annotations/{stem}.xml` per image
//! 2. images: flat copies into `JPEGImages/{stem}.jpg`
//! 3. image sets: `ImageSets/{split}.txt`, one stem per line
//!
//! Per-image work runs on the rayon pool. A failing image is logged and
//! recorded in the [`ConversionReport`] while the rest of the batch
//! continues, unless [`ConvertOptions::fail_fast`] is set.

pub mod report;

pub use report::{
    ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity, SplitCounts,
};

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rayon::prelude::*;

use crate::bbox::FaceBox;
use crate::error::WiderError;
use crate::voc;
use crate::wider::{load_split_table, Split, SplitTable};

/// Name of the dataset directory created under the target root.
pub const DATASET_DIR: &str = "WIDER";

/// Options shared by every stage.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Splits to convert, in order.
    pub splits: Vec<Split>,
    /// Abort on the first per-image failure instead of skipping the image.
    pub fail_fast: bool,
    /// Draw progress bars for per-image stages.
    pub show_progress: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            splits: Split::ALL.to_vec(),
            fail_fast: false,
            show_progress: true,
        }
    }
}

/// The VOC directory tree under `{target}/WIDER`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub annotations_dir: PathBuf,
    pub jpeg_images_dir: PathBuf,
    pub image_sets_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(target: &Path) -> Self {
        let root = target.join(DATASET_DIR);
        Self {
            annotations_dir: root.join("Annotations"),
            jpeg_images_dir: root.join("JPEGImages"),
            image_sets_dir: root.join("ImageSets"),
            root,
        }
    }

    /// Create every directory of the layout that does not exist yet.
    pub fn create(&self) -> Result<(), WiderError> {
        ensure_dir(&self.annotations_dir)?;
        ensure_dir(&self.jpeg_images_dir)?;
        ensure_dir(&self.image_sets_dir)
    }
}

/// Create `path` and its parents if missing.
pub fn ensure_dir(path: &Path) -> Result<(), WiderError> {
    fs::create_dir_all(path).map_err(|source| WiderError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert the WIDER dataset under `source` into a VOC tree under `target`.
///
/// Each split table is read once and shared by all three stages. Table
/// and directory failures abort the run; per-image failures end up in the
/// returned report (or abort, with `fail_fast`).
pub fn convert_wider_to_voc(
    source: &Path,
    target: &Path,
    options: &ConvertOptions,
) -> Result<ConversionReport, WiderError> {
    let layout = OutputLayout::new(target);
    layout.create()?;

    let mut report = ConversionReport::new(source, layout.root.clone());

    let mut tables = Vec::with_capacity(options.splits.len());
    for &split in &options.splits {
        let table = load_split_table(source, split)?;
        report.record_table(&table);
        tables.push(table);
    }

    for table in &tables {
        info!("Generating annotations: {}", table.split);
        generate_annotations(source, table, &layout.annotations_dir, options, &mut report)?;
    }

    for table in &tables {
        info!("Copying images: {}", table.split);
        copy_images(source, table, &layout.jpeg_images_dir, options, &mut report)?;
    }

    for table in &tables {
        info!("Generating image sets: {}", table.split);
        write_image_set(table, &layout.image_sets_dir, &mut report)?;
    }

    info!(
        "Conversion finished: {} error(s), {} warning(s)",
        report.error_count(),
        report.warning_count()
    );
    Ok(report)
}

struct AnnotationJob<'a> {
    image_path: PathBuf,
    image_name: String,
    boxes: &'a [FaceBox],
    target: PathBuf,
}

/// Write `{stem}.xml` into `annotations_dir` for every image of `table`.
pub fn generate_annotations(
    root: &Path,
    table: &SplitTable,
    annotations_dir: &Path,
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> Result<(), WiderError> {
    ensure_dir(annotations_dir)?;

    let jobs: Vec<AnnotationJob<'_>> = table
        .images()
        .map(|(event, image)| AnnotationJob {
            image_path: table.image_path(root, event, image),
            image_name: image.file_name(),
            boxes: &image.boxes,
            target: annotations_dir.join(format!("{}.xml", image.stem)),
        })
        .collect();

    let label = format!("annotations {}", table.split);
    let results = run_per_image(&jobs, &label, options, |job| {
        voc::write_annotation(&job.image_path, &job.image_name, job.boxes, &job.target)
    })?;

    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(_) => report.counts_mut(table.split).annotations_written += 1,
            Err(err) => {
                let code = match &err {
                    WiderError::AnnotationWrite { .. } => ConversionIssueCode::AnnotationWriteFailed,
                    _ => ConversionIssueCode::UnreadableImage,
                };
                record_failure(report, code, table.split, &job.image_path, &err);
            }
        }
    }

    Ok(())
}

struct CopyJob {
    from: PathBuf,
    to: PathBuf,
}

/// Copy every image of `table` to `images_dir/{stem}.jpg`, replacing existing files.
pub fn copy_images(
    root: &Path,
    table: &SplitTable,
    images_dir: &Path,
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> Result<(), WiderError> {
    ensure_dir(images_dir)?;

    let jobs: Vec<CopyJob> = table
        .images()
        .map(|(event, image)| CopyJob {
            from: table.image_path(root, event, image),
            to: images_dir.join(image.file_name()),
        })
        .collect();

    let label = format!("images {}", table.split);
    let results = run_per_image(&jobs, &label, options, |job| {
        fs::copy(&job.from, &job.to).map_err(|source| WiderError::ImageCopy {
            from: job.from.clone(),
            to: job.to.clone(),
            source,
        })
    })?;

    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(_) => report.counts_mut(table.split).images_copied += 1,
            Err(err) => record_failure(
                report,
                ConversionIssueCode::ImageCopyFailed,
                table.split,
                &job.from,
                &err,
            ),
        }
    }

    Ok(())
}

/// Write `{split}.txt` into `image_sets_dir`: every stem, one per line, in
/// event order then file order. Returns the manifest path.
pub fn write_image_set(
    table: &SplitTable,
    image_sets_dir: &Path,
    report: &mut ConversionReport,
) -> Result<PathBuf, WiderError> {
    ensure_dir(image_sets_dir)?;

    let path = image_sets_dir.join(format!("{}.txt", table.split));
    let manifest = image_set_lines(table);
    fs::write(&path, manifest).map_err(|source| WiderError::io(&path, source))?;

    report.counts_mut(table.split).manifest_lines = table.image_count();
    Ok(path)
}

/// Manifest text for `table`; each stem is terminated by a newline.
pub fn image_set_lines(table: &SplitTable) -> String {
    let mut out = String::new();
    for (_, image) in table.images() {
        out.push_str(&image.stem);
        out.push('\n');
    }
    out
}

// Results come back in job order whatever order the pool ran them in.
fn run_per_image<J, T, F>(
    jobs: &[J],
    label: &str,
    options: &ConvertOptions,
    task: F,
) -> Result<Vec<Result<T, WiderError>>, WiderError>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T, WiderError> + Sync,
{
    let pb = progress_bar(jobs.len() as u64, label, options.show_progress);
    let run = |job: &J| {
        let result = task(job);
        pb.inc(1);
        result
    };

    let outcome = if options.fail_fast {
        jobs.par_iter()
            .map(run)
            .collect::<Result<Vec<T>, WiderError>>()
            .map(|done| done.into_iter().map(Ok).collect())
    } else {
        Ok(jobs.par_iter().map(run).collect())
    };

    pb.finish_and_clear();
    outcome
}

fn record_failure(
    report: &mut ConversionReport,
    code: ConversionIssueCode,
    split: Split,
    path: &Path,
    err: &WiderError,
) {
    error!("{err}");
    report.add(ConversionIssue::error(code, split, path, err.to_string()));
}

fn progress_bar(len: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(&format!(
        "{{spinner:.green}} [{label}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})"
    )) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
