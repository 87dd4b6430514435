#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

const MI_INT8: u32 = 1;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

const MX_CELL_CLASS: u32 = 1;
const MX_CHAR_CLASS: u32 = 4;
const MX_DOUBLE_CLASS: u32 = 6;

/// A MATLAB value the test writer knows how to encode.
#[derive(Clone, Debug)]
pub enum Value {
    Char(String),
    /// Column cell array (`n x 1`).
    Cell(Vec<Value>),
    /// Double matrix given row by row.
    Matrix { rows: usize, cols: usize, row_major: Vec<f64> },
}

impl Value {
    pub fn boxes(boxes: &[[f64; 4]]) -> Self {
        if boxes.is_empty() {
            return Value::Matrix {
                rows: 0,
                cols: 0,
                row_major: vec![],
            };
        }
        Value::Matrix {
            rows: boxes.len(),
            cols: 4,
            row_major: boxes.iter().flatten().copied().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MatOptions {
    pub big_endian: bool,
    pub compressed: bool,
}

struct Encoder {
    big_endian: bool,
}

impl Encoder {
    fn u16(&self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32(&self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn f64(&self, value: f64) -> [u8; 8] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn element(&self, data_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(payload.len() + 16);
        bytes.extend_from_slice(&self.u32(data_type));
        bytes.extend_from_slice(&self.u32(payload.len() as u32));
        bytes.extend_from_slice(payload);
        bytes.resize(bytes.len() + (8 - payload.len() % 8) % 8, 0);
        bytes
    }

    fn matrix(&self, name: &str, value: &Value) -> Vec<u8> {
        let (class, dims, tail) = match value {
            Value::Char(text) => {
                let units: Vec<u8> = text.encode_utf16().flat_map(|u| self.u16(u)).collect();
                let len = text.encode_utf16().count();
                let dims = if len == 0 { [0, 0] } else { [1, len] };
                (MX_CHAR_CLASS, dims, self.element(MI_UINT16, &units))
            }
            Value::Cell(cells) => {
                let tail = cells.iter().flat_map(|cell| self.matrix("", cell)).collect();
                (MX_CELL_CLASS, [cells.len(), 1], tail)
            }
            Value::Matrix {
                rows,
                cols,
                row_major,
            } => {
                let mut data = Vec::with_capacity(row_major.len() * 8);
                for col in 0..*cols {
                    for row in 0..*rows {
                        data.extend_from_slice(&self.f64(row_major[row * cols + col]));
                    }
                }
                (MX_DOUBLE_CLASS, [*rows, *cols], self.element(MI_DOUBLE, &data))
            }
        };

        let mut flags = self.u32(class).to_vec();
        flags.extend_from_slice(&self.u32(0));
        let dims: Vec<u8> = dims.iter().flat_map(|d| self.u32(*d as u32)).collect();

        let mut body = self.element(MI_UINT32, &flags);
        body.extend(self.element(MI_INT32, &dims));
        body.extend(self.element(MI_INT8, name.as_bytes()));
        body.extend(tail);
        self.element(MI_MATRIX, &body)
    }
}

/// Encode a Level 5 MAT file holding `vars`.
pub fn mat_bytes(vars: &[(&str, Value)], options: MatOptions) -> Vec<u8> {
    let encoder = Encoder {
        big_endian: options.big_endian,
    };

    let mut bytes = b"MATLAB 5.0 MAT-file, written by wider2voc tests".to_vec();
    bytes.resize(116, b' ');
    bytes.extend_from_slice(&[0; 8]);
    bytes.extend_from_slice(&encoder.u16(0x0100));
    bytes.extend_from_slice(if options.big_endian { b"MI" } else { b"IM" });

    for (name, value) in vars {
        let matrix = encoder.matrix(name, value);
        if options.compressed {
            let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
            zlib.write_all(&matrix).expect("compress matrix");
            let packed = zlib.finish().expect("finish zlib stream");
            bytes.extend_from_slice(&encoder.u32(MI_COMPRESSED));
            bytes.extend_from_slice(&encoder.u32(packed.len() as u32));
            bytes.extend_from_slice(&packed);
        } else {
            bytes.extend(matrix);
        }
    }
    bytes
}

/// One image of a fixture split: stem, size and boxes as `[x, y, w, h]`.
#[derive(Clone, Debug)]
pub struct FixtureImage {
    pub stem: String,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    pub boxes: Vec<[f64; 4]>,
}

impl FixtureImage {
    pub fn new(stem: &str, boxes: &[[f64; 4]]) -> Self {
        Self {
            stem: stem.to_string(),
            width: 64,
            height: 48,
            grayscale: false,
            boxes: boxes.to_vec(),
        }
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn grayscale(mut self) -> Self {
        self.grayscale = true;
        self
    }
}

pub type FixtureEvent = (String, Vec<FixtureImage>);

pub fn event(name: &str, images: Vec<FixtureImage>) -> FixtureEvent {
    (name.to_string(), images)
}

/// The three WIDER variables for `events`.
pub fn split_vars(events: &[FixtureEvent]) -> Vec<(&'static str, Value)> {
    let event_list = events
        .iter()
        .map(|(name, _)| Value::Char(name.clone()))
        .collect();
    let file_list = events
        .iter()
        .map(|(_, images)| {
            Value::Cell(
                images
                    .iter()
                    .map(|image| Value::Char(image.stem.clone()))
                    .collect(),
            )
        })
        .collect();
    let bbx_list = events
        .iter()
        .map(|(_, images)| {
            Value::Cell(
                images
                    .iter()
                    .map(|image| Value::boxes(&image.boxes))
                    .collect(),
            )
        })
        .collect();

    vec![
        ("event_list", Value::Cell(event_list)),
        ("file_list", Value::Cell(file_list)),
        ("face_bbx_list", Value::Cell(bbx_list)),
    ]
}

pub fn table_path(root: &Path, split: &str) -> PathBuf {
    root.join("wider_face_split")
        .join(format!("wider_face_{split}.mat"))
}

pub fn image_path(root: &Path, split: &str, event: &str, stem: &str) -> PathBuf {
    root.join(format!("WIDER_{split}"))
        .join("images")
        .join(event)
        .join(format!("{stem}.jpg"))
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, grayscale: bool) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    if grayscale {
        image::GrayImage::from_fn(width, height, |x, y| image::Luma([((x + y) % 256) as u8]))
            .save(path)
            .expect("write grayscale jpeg");
    } else {
        image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
        .save(path)
        .expect("write rgb jpeg");
    }
}

/// Write a split table plus one JPEG per listed image under `root`.
pub fn write_split(root: &Path, split: &str, events: &[FixtureEvent], options: MatOptions) {
    let table = table_path(root, split);
    fs::create_dir_all(table.parent().expect("table has parent")).expect("create split dir");
    fs::write(&table, mat_bytes(&split_vars(events), options)).expect("write mat file");

    for (event_name, images) in events {
        for image in images {
            write_jpeg(
                &image_path(root, split, event_name, &image.stem),
                image.width,
                image.height,
                image.grayscale,
            );
        }
    }
}

/// The single-image dataset from the usage example.
pub fn parade_events() -> Vec<FixtureEvent> {
    vec![event(
        "0--Parade",
        vec![FixtureImage::new(
            "0_Parade_marchingband_1_100",
            &[[10.0, 20.0, 30.0, 40.0]],
        )],
    )]
}

/// A small two-event dataset for `val`.
pub fn val_events() -> Vec<FixtureEvent> {
    vec![
        event(
            "1--Handshaking",
            vec![
                FixtureImage::new("1_Handshaking_1", &[[1.0, 2.0, 3.0, 4.0], [5.5, 6.5, 7.0, 8.0]]),
                FixtureImage::new("1_Handshaking_2", &[]).grayscale(),
            ],
        ),
        event(
            "2--Demonstration",
            vec![FixtureImage::new("2_Demonstration_1", &[[0.0, 0.0, 10.0, 10.0]]).sized(80, 60)],
        ),
    ]
}

#[derive(Debug, PartialEq)]
pub struct ParsedObject {
    pub name: String,
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

#[derive(Debug, PartialEq)]
pub struct ParsedAnnotation {
    pub folder: String,
    pub filename: String,
    pub database: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub objects: Vec<ParsedObject>,
}

fn child<'a, 'input>(node: roxmltree::Node<'a, 'input>, tag: &str) -> roxmltree::Node<'a, 'input> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
        .unwrap_or_else(|| panic!("missing <{tag}>"))
}

fn text(node: roxmltree::Node<'_, '_>, tag: &str) -> String {
    child(node, tag).text().unwrap_or_default().to_string()
}

/// Parse a written annotation back with roxmltree.
pub fn parse_annotation(xml: &str) -> ParsedAnnotation {
    let doc = roxmltree::Document::parse(xml).expect("valid xml");
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "annotation");

    let size = child(root, "size");
    let objects = root
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "object")
        .map(|object| {
            let bndbox = child(object, "bndbox");
            ParsedObject {
                name: text(object, "name"),
                xmin: text(bndbox, "xmin").parse().expect("xmin"),
                ymin: text(bndbox, "ymin").parse().expect("ymin"),
                xmax: text(bndbox, "xmax").parse().expect("xmax"),
                ymax: text(bndbox, "ymax").parse().expect("ymax"),
            }
        })
        .collect();

    ParsedAnnotation {
        folder: text(root, "folder"),
        filename: text(root, "filename"),
        database: text(child(root, "source"), "database"),
        width: text(size, "width").parse().expect("width"),
        height: text(size, "height").parse().expect("height"),
        depth: text(size, "depth").parse().expect("depth"),
        objects,
    }
}

pub fn read_annotation(path: &Path) -> ParsedAnnotation {
    parse_annotation(&fs::read_to_string(path).expect("read annotation"))
}
