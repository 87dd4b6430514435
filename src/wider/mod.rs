//! WIDER Face split tables.
//!
//! Each split ships as `wider_face_split/wider_face_{split}.mat`, holding
//! three index-aligned cell arrays: `event_list` (event directory names),
//! `file_list` (per event, image stems) and `face_bbx_list` (per event, per
//! image, an `M x 4` matrix of `x, y, width, height` rows).
//!
//! Loading normalizes the box matrices into a flat `Vec<FaceBox>` per
//! image, so nothing downstream cares whether the file stored one box as a
//! `1 x 4` row, several as `M x 4`, or none at all.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::bbox::FaceBox;
use crate::error::WiderError;
use crate::mat::{MatArray, MatFile};

const SPLIT_DIR: &str = "wider_face_split";
const EVENT_LIST: &str = "event_list";
const FILE_LIST: &str = "file_list";
const FACE_BBX_LIST: &str = "face_bbx_list";

/// Image file extension used throughout the WIDER image tree.
pub const IMAGE_EXTENSION: &str = "jpg";

/// A named partition of the dataset.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    #[default]
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }

    /// `{root}/wider_face_split/wider_face_{split}.mat`
    pub fn table_path(&self, root: &Path) -> PathBuf {
        root.join(SPLIT_DIR)
            .join(format!("wider_face_{}.mat", self.name()))
    }

    /// `{root}/WIDER_{split}/images`
    pub fn images_dir(&self, root: &Path) -> PathBuf {
        root.join(format!("WIDER_{}", self.name())).join("images")
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One image: its stem and its faces, in table order.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    pub stem: String,
    pub boxes: Vec<FaceBox>,
}

impl ImageRecord {
    /// `{stem}.jpg`
    pub fn file_name(&self) -> String {
        format!("{}.{IMAGE_EXTENSION}", self.stem)
    }
}

/// An event directory and the images listed under it.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub images: Vec<ImageRecord>,
}

/// A box whose negative width or height was flipped while loading.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxAdjustment {
    pub stem: String,
    pub index: usize,
    pub original: FaceBox,
}

/// The parsed annotation table of one split.
#[derive(Clone, Debug)]
pub struct SplitTable {
    pub split: Split,
    pub source: PathBuf,
    pub events: Vec<Event>,
    pub adjustments: Vec<BoxAdjustment>,
}

impl SplitTable {
    /// Every image in event-major, then within-event order.
    pub fn images(&self) -> impl Iterator<Item = (&Event, &ImageRecord)> {
        self.events
            .iter()
            .flat_map(|event| event.images.iter().map(move |image| (event, image)))
    }

    pub fn image_count(&self) -> usize {
        self.events.iter().map(|event| event.images.len()).sum()
    }

    pub fn face_count(&self) -> usize {
        self.images().map(|(_, image)| image.boxes.len()).sum()
    }

    /// Source path of one image under `root`.
    pub fn image_path(&self, root: &Path, event: &Event, image: &ImageRecord) -> PathBuf {
        self.split
            .images_dir(root)
            .join(&event.name)
            .join(image.file_name())
    }
}

/// Load and normalize the annotation table of `split` under `root`.
pub fn load_split_table(root: &Path, split: Split) -> Result<SplitTable, WiderError> {
    let path = split.table_path(root);
    let file = MatFile::open(&path)?;
    let table = split_table_from_mat(&file, split, &path)?;

    info!(
        "Loaded {} split: {} events, {} images, {} faces",
        split,
        table.events.len(),
        table.image_count(),
        table.face_count()
    );
    for adjustment in &table.adjustments {
        warn!(
            "{}: box #{} of '{}' has negative size {:?}; flipped to a non-negative extent",
            path.display(),
            adjustment.index,
            adjustment.stem,
            adjustment.original
        );
    }

    Ok(table)
}

/// Build a [`SplitTable`] from an already parsed MAT file.
///
/// `path` is only used in error messages.
pub fn split_table_from_mat(
    file: &MatFile,
    split: Split,
    path: &Path,
) -> Result<SplitTable, WiderError> {
    let malformed = |message: String| WiderError::SplitTable {
        path: path.to_path_buf(),
        message,
    };

    let event_list = required_cells(file, EVENT_LIST).map_err(&malformed)?;
    let file_list = required_cells(file, FILE_LIST).map_err(&malformed)?;
    let bbx_list = required_cells(file, FACE_BBX_LIST).map_err(&malformed)?;

    if event_list.len() != file_list.len() || event_list.len() != bbx_list.len() {
        return Err(malformed(format!(
            "{EVENT_LIST}, {FILE_LIST} and {FACE_BBX_LIST} have different lengths ({}, {}, {})",
            event_list.len(),
            file_list.len(),
            bbx_list.len()
        )));
    }

    let mut events = Vec::with_capacity(event_list.len());
    let mut adjustments = Vec::new();

    for (event_idx, ((event_name, files), box_cells)) in event_list
        .iter()
        .zip(file_list)
        .zip(bbx_list)
        .enumerate()
    {
        let name = event_name
            .as_str()
            .ok_or_else(|| {
                malformed(format!(
                    "{EVENT_LIST}[{event_idx}] is a {} array, expected char",
                    event_name.class_name()
                ))
            })?
            .to_string();

        let stems = cell_entries(files).ok_or_else(|| {
            malformed(format!(
                "{FILE_LIST}[{event_idx}] ('{name}') is not a cell array"
            ))
        })?;
        let box_sets = cell_entries(box_cells).ok_or_else(|| {
            malformed(format!(
                "{FACE_BBX_LIST}[{event_idx}] ('{name}') is not a cell array"
            ))
        })?;

        if stems.len() != box_sets.len() {
            return Err(malformed(format!(
                "event '{name}' lists {} file(s) but {} box set(s)",
                stems.len(),
                box_sets.len()
            )));
        }

        let mut images = Vec::with_capacity(stems.len());
        for (file_idx, (stem, box_set)) in stems.iter().zip(box_sets).enumerate() {
            let stem = stem
                .as_str()
                .ok_or_else(|| {
                    malformed(format!(
                        "{FILE_LIST}[{event_idx}][{file_idx}] is a {} array, expected char",
                        stem.class_name()
                    ))
                })?
                .to_string();

            let boxes = face_boxes(box_set).map_err(|message| {
                malformed(format!("boxes for '{stem}' in event '{name}': {message}"))
            })?;

            let boxes = boxes
                .into_iter()
                .enumerate()
                .map(|(index, face)| {
                    if face.has_negative_size() {
                        adjustments.push(BoxAdjustment {
                            stem: stem.clone(),
                            index,
                            original: face,
                        });
                        face.normalized()
                    } else {
                        face
                    }
                })
                .collect();

            images.push(ImageRecord { stem, boxes });
        }

        events.push(Event { name, images });
    }

    Ok(SplitTable {
        split,
        source: path.to_path_buf(),
        events,
        adjustments,
    })
}

fn required_cells<'a>(file: &'a MatFile, name: &str) -> Result<&'a [MatArray], String> {
    let array = file
        .get(name)
        .ok_or_else(|| format!("missing variable '{name}'"))?;
    cell_entries(array).ok_or_else(|| {
        format!(
            "variable '{name}' is a {} array, expected cell",
            array.class_name()
        )
    })
}

// An empty placeholder (a 0x0 double) stands for an empty cell.
fn cell_entries(array: &MatArray) -> Option<&[MatArray]> {
    match array {
        MatArray::Cell { cells, .. } => Some(cells),
        MatArray::Numeric { data, .. } if data.is_empty() => Some(&[]),
        _ => None,
    }
}

/// Normalize one stored box set into a list of boxes.
///
/// `M x 4` yields M boxes (rows, column-major storage); any 4-element
/// vector yields one box; an empty array yields none.
fn face_boxes(array: &MatArray) -> Result<Vec<FaceBox>, String> {
    let data = array
        .as_numeric()
        .ok_or_else(|| format!("{} array, expected numeric", array.class_name()))?;
    let dims = array.dims();

    if data.is_empty() {
        return Ok(Vec::new());
    }

    let rows = if dims.len() == 2 && dims[1] == 4 {
        dims[0]
    } else if data.len() == 4 && dims.iter().filter(|dim| **dim != 1).count() == 1 {
        1
    } else {
        return Err(format!("unexpected box matrix shape {dims:?}"));
    };

    (0..rows)
        .map(|row| {
            let face = FaceBox::from_xywh(
                data[row],
                data[rows + row],
                data[2 * rows + row],
                data[3 * rows + row],
            );
            if face.is_finite() {
                Ok(face)
            } else {
                Err(format!("box #{row} has non-finite values {face:?}"))
            }
        })
        .collect()
}
