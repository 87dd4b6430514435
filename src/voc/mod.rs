//! Pascal VOC annotation documents for WIDER images.
//!
//! One XML file per image, in the element order downstream VOC tooling
//! expects: `folder`, `filename`, `source`, `size`, `owner`, then one
//! `object` per face.

use std::fmt;
use std::fs;
use std::path::Path;

use image::ImageReader;

use crate::bbox::{CornerBox, FaceBox};
use crate::error::WiderError;

/// Value of `<folder>`.
pub const FOLDER: &str = "WIDER";
/// Value of `<source><database>`.
pub const DATABASE: &str = "WIDER FACE";
/// Value of `<source><annotation>`.
pub const ANNOTATION_TYPE: &str = "WIDER";
/// Value of `<owner><name>`.
pub const OWNER: &str = "Multimedia Laboratory, Department of Information Engineering, The Chinese University of Hong Kong (http://mmlab.ie.cuhk.edu.hk/projects/WIDERFace/)";
/// Value of `<object><name>`.
pub const OBJECT_NAME: &str = "face";

/// Dimensions of a decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    /// Channel count of the decoded pixels (1 for grayscale, 3 for RGB).
    pub depth: u8,
}

/// Decode the image at `path` and report its size and channel count.
pub fn probe_image(path: &Path) -> Result<ImageSize, WiderError> {
    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| WiderError::io(path, source))?
        .decode()
        .map_err(|source| WiderError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(ImageSize {
        width: image.width(),
        height: image.height(),
        depth: image.color().channel_count(),
    })
}

/// The annotation of one image, ready to be rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationDocument {
    pub filename: String,
    pub size: ImageSize,
    pub objects: Vec<CornerBox>,
}

impl AnnotationDocument {
    /// Build a document with one `face` object per box, in order.
    pub fn new(filename: impl Into<String>, size: ImageSize, boxes: &[FaceBox]) -> Self {
        Self {
            filename: filename.into(),
            size,
            objects: boxes.iter().map(FaceBox::to_corners).collect(),
        }
    }

    /// Render the document as XML text.
    pub fn to_xml(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AnnotationDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        writeln!(f, "<annotation>")?;
        writeln!(f, "  <folder>{}</folder>", xml_escape(FOLDER))?;
        writeln!(f, "  <filename>{}</filename>", xml_escape(&self.filename))?;
        writeln!(f, "  <source>")?;
        writeln!(f, "    <database>{}</database>", xml_escape(DATABASE))?;
        writeln!(f, "    <annotation>{}</annotation>", xml_escape(ANNOTATION_TYPE))?;
        writeln!(f, "  </source>")?;
        writeln!(f, "  <size>")?;
        writeln!(f, "    <width>{}</width>", self.size.width)?;
        writeln!(f, "    <height>{}</height>", self.size.height)?;
        writeln!(f, "    <depth>{}</depth>", self.size.depth)?;
        writeln!(f, "  </size>")?;
        writeln!(f, "  <owner>")?;
        writeln!(f, "    <name>{}</name>", xml_escape(OWNER))?;
        writeln!(f, "  </owner>")?;

        for corners in &self.objects {
            writeln!(f, "  <object>")?;
            writeln!(f, "    <name>{}</name>", xml_escape(OBJECT_NAME))?;
            writeln!(f, "    <bndbox>")?;
            writeln!(f, "      <xmin>{}</xmin>", corners.xmin)?;
            writeln!(f, "      <ymin>{}</ymin>", corners.ymin)?;
            writeln!(f, "      <xmax>{}</xmax>", corners.xmax)?;
            writeln!(f, "      <ymax>{}</ymax>", corners.ymax)?;
            writeln!(f, "    </bndbox>")?;
            writeln!(f, "  </object>")?;
        }

        writeln!(f, "</annotation>")
    }
}

/// Decode `image_path`, build its document and write it to `target`,
/// replacing any existing file.
pub fn write_annotation(
    image_path: &Path,
    image_name: &str,
    boxes: &[FaceBox],
    target: &Path,
) -> Result<AnnotationDocument, WiderError> {
    let size = probe_image(image_path)?;
    let document = AnnotationDocument::new(image_name, size, boxes);

    fs::write(target, document.to_xml()).map_err(|source| WiderError::AnnotationWrite {
        path: target.to_path_buf(),
        source,
    })?;

    Ok(document)
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
