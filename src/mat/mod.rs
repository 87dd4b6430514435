//! MATLAB Level 5 MAT-file reader.
//!
//! Only the subset needed to read annotation tables is supported: numeric,
//! logical, char, cell and struct arrays, in either byte order, with or
//! without zlib compression. Values of every numeric class are widened to
//! `f64`; complex arrays keep their real part.
//!
//! HDF5-based (v7.3) files are rejected.

mod element;

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

pub use element::Endian;
use element::{
    decode_chars, decode_dims, decode_numeric, inflate, Element, ElementReader, ParseResult,
    MI_COMPRESSED, MI_INT32, MI_INT8, MI_MATRIX, MI_UINT32,
};

use crate::error::WiderError;

const HEADER_LEN: usize = 128;
const HEADER_TEXT_LEN: usize = 116;

const MX_CELL_CLASS: u32 = 1;
const MX_STRUCT_CLASS: u32 = 2;
const MX_OBJECT_CLASS: u32 = 3;
const MX_CHAR_CLASS: u32 = 4;
const MX_SPARSE_CLASS: u32 = 5;
const MX_DOUBLE_CLASS: u32 = 6;
const MX_UINT64_CLASS: u32 = 15;

const FLAG_COMPLEX: u32 = 0x0800;
const MAX_NESTING: usize = 64;

/// A decoded MATLAB array.
#[derive(Clone, Debug, PartialEq)]
pub enum MatArray {
    /// Numeric or logical array; `data` is column-major.
    Numeric { dims: Vec<usize>, data: Vec<f64> },
    /// Char array. Multi-row arrays are joined row by row with `\n`.
    Char { dims: Vec<usize>, text: String },
    /// Cell array; `cells` is column-major.
    Cell {
        dims: Vec<usize>,
        cells: Vec<MatArray>,
    },
    /// Struct array; `values[element][field]`, elements column-major.
    Struct {
        dims: Vec<usize>,
        fields: Vec<String>,
        values: Vec<Vec<MatArray>>,
    },
}

impl MatArray {
    /// The array's dimensions as stored.
    pub fn dims(&self) -> &[usize] {
        match self {
            MatArray::Numeric { dims, .. }
            | MatArray::Char { dims, .. }
            | MatArray::Cell { dims, .. }
            | MatArray::Struct { dims, .. } => dims,
        }
    }

    /// Total element count (product of dimensions).
    pub fn numel(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Short class name for error messages.
    pub fn class_name(&self) -> &'static str {
        match self {
            MatArray::Numeric { .. } => "numeric",
            MatArray::Char { .. } => "char",
            MatArray::Cell { .. } => "cell",
            MatArray::Struct { .. } => "struct",
        }
    }

    pub fn as_cells(&self) -> Option<&[MatArray]> {
        match self {
            MatArray::Cell { cells, .. } => Some(cells),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MatArray::Char { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            MatArray::Numeric { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Look up a field of a scalar struct.
    pub fn field(&self, name: &str) -> Option<&MatArray> {
        match self {
            MatArray::Struct { fields, values, .. } if values.len() == 1 => fields
                .iter()
                .position(|field| field == name)
                .map(|idx| &values[0][idx]),
            _ => None,
        }
    }
}

/// The named top-level variables of one MAT file, in file order.
#[derive(Clone, Debug)]
pub struct MatFile {
    description: String,
    endian: Endian,
    variables: Vec<(String, MatArray)>,
}

impl MatFile {
    /// Read and parse a MAT file from disk.
    pub fn open(path: &Path) -> Result<Self, WiderError> {
        let bytes = fs::read(path).map_err(|source| WiderError::io(path, source))?;
        let file = parse_mat_bytes(&bytes).map_err(|message| WiderError::MatParse {
            path: path.to_path_buf(),
            message,
        })?;
        debug!(
            "Loaded {} ({:?}, {} variable(s)): {}",
            path.display(),
            file.endian,
            file.variables.len(),
            file.description
        );
        Ok(file)
    }

    /// Parse a MAT file held in memory.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WiderError> {
        parse_mat_bytes(bytes).map_err(|message| WiderError::MatParse {
            path: PathBuf::from("<memory>"),
            message,
        })
    }

    /// The descriptive text at the start of the header.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn get(&self, name: &str) -> Option<&MatArray> {
        self.variables
            .iter()
            .find(|(var_name, _)| var_name == name)
            .map(|(_, array)| array)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(name, _)| name.as_str())
    }
}

fn parse_mat_bytes(bytes: &[u8]) -> ParseResult<MatFile> {
    if bytes.len() < HEADER_LEN {
        return Err(format!(
            "file is {} byte(s), shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        ));
    }

    let description = String::from_utf8_lossy(&bytes[..HEADER_TEXT_LEN])
        .trim_end_matches(['\0', ' '])
        .to_string();
    if description.contains("MATLAB 7.3") {
        return Err("MAT v7.3 (HDF5) files are not supported".to_string());
    }

    let endian = Endian::from_indicator([bytes[126], bytes[127]])
        .ok_or_else(|| "missing MAT endian indicator (expected 'IM' or 'MI')".to_string())?;

    let mut reader = ElementReader::new(&bytes[HEADER_LEN..], endian);
    let mut variables = Vec::new();

    while !reader.is_empty() {
        let element = reader.next_element()?;
        match element.data_type {
            MI_MATRIX => variables.push(parse_matrix(element.data, endian, 0)?),
            MI_COMPRESSED => {
                let inflated = inflate(element.data)?;
                let mut inner = ElementReader::new(&inflated, endian);
                let matrix = inner.next_element()?;
                if matrix.data_type != MI_MATRIX {
                    return Err(format!(
                        "compressed element holds type {} (expected miMATRIX)",
                        matrix.data_type
                    ));
                }
                variables.push(parse_matrix(matrix.data, endian, 0)?);
            }
            other => debug!("Skipping top-level MAT element of type {other}"),
        }
    }

    Ok(MatFile {
        description,
        endian,
        variables,
    })
}

fn parse_matrix(data: &[u8], endian: Endian, depth: usize) -> ParseResult<(String, MatArray)> {
    if depth > MAX_NESTING {
        return Err(format!("arrays nested deeper than {MAX_NESTING} levels"));
    }

    // A zero-length miMATRIX is an empty array (common inside cells).
    if data.is_empty() {
        return Ok((
            String::new(),
            MatArray::Numeric {
                dims: vec![0, 0],
                data: Vec::new(),
            },
        ));
    }

    let mut reader = ElementReader::new(data, endian);

    let flags = expect_type(reader.next_element()?, MI_UINT32, "array flags")?;
    if flags.data.len() < 8 {
        return Err("array flags element is shorter than 8 bytes".to_string());
    }
    let flags_word = endian.u32([flags.data[0], flags.data[1], flags.data[2], flags.data[3]]);
    let class = flags_word & 0xFF;
    let complex = flags_word & FLAG_COMPLEX != 0;

    let dims = decode_dims(&reader.next_element()?, endian)?;
    let numel = dims
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| format!("dimensions {dims:?} overflow"))?;

    let name_element = expect_type(reader.next_element()?, MI_INT8, "array name")?;
    let name = String::from_utf8_lossy(name_element.data).into_owned();

    let array = match class {
        MX_CELL_CLASS => {
            ensure_room(&reader, numel, "cell")?;
            let mut cells = Vec::with_capacity(numel);
            for _ in 0..numel {
                let cell = expect_type(reader.next_element()?, MI_MATRIX, "cell entry")?;
                cells.push(parse_matrix(cell.data, endian, depth + 1)?.1);
            }
            MatArray::Cell { dims, cells }
        }
        MX_STRUCT_CLASS => parse_struct(&mut reader, dims, numel, endian, depth)?,
        MX_CHAR_CLASS => {
            let chars = if reader.is_empty() {
                Vec::new()
            } else {
                decode_chars(&reader.next_element()?, endian)?
            };
            if chars.len() != numel {
                return Err(format!(
                    "char array '{name}' has {} character(s) but dimensions {dims:?}",
                    chars.len()
                ));
            }
            let text = chars_to_text(&chars, &dims);
            MatArray::Char { dims, text }
        }
        MX_DOUBLE_CLASS..=MX_UINT64_CLASS => {
            let values = if reader.is_empty() {
                Vec::new()
            } else {
                decode_numeric(&reader.next_element()?, endian)?
            };
            if values.len() != numel {
                return Err(format!(
                    "numeric array '{name}' has {} value(s) but dimensions {dims:?}",
                    values.len()
                ));
            }
            if complex && !reader.is_empty() {
                reader.next_element()?;
            }
            MatArray::Numeric { dims, data: values }
        }
        MX_OBJECT_CLASS | MX_SPARSE_CLASS => {
            return Err(format!(
                "array '{name}' uses unsupported class {class} (object/sparse)"
            ));
        }
        other => return Err(format!("array '{name}' uses unknown class {other}")),
    };

    Ok((name, array))
}

fn parse_struct(
    reader: &mut ElementReader<'_>,
    dims: Vec<usize>,
    numel: usize,
    endian: Endian,
    depth: usize,
) -> ParseResult<MatArray> {
    let name_len = expect_type(reader.next_element()?, MI_INT32, "field name length")?;
    let name_len = decode_numeric(&name_len, endian)?
        .first()
        .copied()
        .filter(|len| *len >= 1.0)
        .ok_or_else(|| "struct field name length is missing or zero".to_string())?
        as usize;

    let names = expect_type(reader.next_element()?, MI_INT8, "field names")?;
    let fields: Vec<String> = names
        .data
        .chunks(name_len)
        .map(|chunk| {
            let end = chunk.iter().position(|b| *b == 0).unwrap_or(chunk.len());
            String::from_utf8_lossy(&chunk[..end]).into_owned()
        })
        .collect();

    let total = numel
        .checked_mul(fields.len())
        .ok_or_else(|| "struct element count overflows".to_string())?;
    ensure_room(reader, total.max(numel), "struct")?;

    let mut values = Vec::with_capacity(numel);
    for _ in 0..numel {
        let mut element_values = Vec::with_capacity(fields.len());
        for _ in &fields {
            let value = expect_type(reader.next_element()?, MI_MATRIX, "struct field")?;
            element_values.push(parse_matrix(value.data, endian, depth + 1)?.1);
        }
        values.push(element_values);
    }

    Ok(MatArray::Struct {
        dims,
        fields,
        values,
    })
}

fn expect_type<'a>(element: Element<'a>, data_type: u32, what: &str) -> ParseResult<Element<'a>> {
    if element.data_type != data_type {
        return Err(format!(
            "{what} has storage type {} (expected {data_type})",
            element.data_type
        ));
    }
    Ok(element)
}

// Each child element needs at least a tag, which bounds the count before allocating.
fn ensure_room(reader: &ElementReader<'_>, count: usize, what: &str) -> ParseResult<()> {
    if count > reader.remaining() / 8 {
        return Err(format!(
            "{what} array declares {count} element(s) but only {} byte(s) remain",
            reader.remaining()
        ));
    }
    Ok(())
}

fn chars_to_text(chars: &[char], dims: &[usize]) -> String {
    let rows = dims.first().copied().unwrap_or(0);
    if rows <= 1 || dims.len() != 2 {
        return chars.iter().collect();
    }
    let cols = dims[1];
    (0..rows)
        .map(|row| (0..cols).map(|col| chars[row + col * rows]).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
