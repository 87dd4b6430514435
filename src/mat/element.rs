//! Level 5 MAT data elements: tags, byte order and typed payload decoding.

use std::io::Read;

use flate2::read::ZlibDecoder;

pub(crate) type ParseResult<T> = Result<T, String>;

pub(crate) const MI_INT8: u32 = 1;
pub(crate) const MI_UINT8: u32 = 2;
pub(crate) const MI_INT16: u32 = 3;
pub(crate) const MI_UINT16: u32 = 4;
pub(crate) const MI_INT32: u32 = 5;
pub(crate) const MI_UINT32: u32 = 6;
pub(crate) const MI_SINGLE: u32 = 7;
pub(crate) const MI_DOUBLE: u32 = 9;
pub(crate) const MI_INT64: u32 = 12;
pub(crate) const MI_UINT64: u32 = 13;
pub(crate) const MI_MATRIX: u32 = 14;
pub(crate) const MI_COMPRESSED: u32 = 15;
pub(crate) const MI_UTF8: u32 = 16;
pub(crate) const MI_UTF16: u32 = 17;
pub(crate) const MI_UTF32: u32 = 18;

/// Byte order declared by the file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Interpret the two endian-indicator bytes at offset 126 of the header.
    pub(crate) fn from_indicator(bytes: [u8; 2]) -> Option<Self> {
        match &bytes {
            b"IM" => Some(Endian::Little),
            b"MI" => Some(Endian::Big),
            _ => None,
        }
    }

    fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        }
    }

    pub(crate) fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        }
    }

    fn u64(self, b: [u8; 8]) -> u64 {
        match self {
            Endian::Little => u64::from_le_bytes(b),
            Endian::Big => u64::from_be_bytes(b),
        }
    }
}

/// One data element: its storage type and its (unpadded) payload.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Element<'a> {
    pub data_type: u32,
    pub data: &'a [u8],
}

/// Sequential reader over a run of data elements.
pub(crate) struct ElementReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ElementReader<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            pos: 0,
            endian,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                format!(
                    "unexpected end of data at offset {} (needed {} more byte(s))",
                    self.pos, len
                )
            })?;
        let chunk = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(chunk)
    }

    fn read_u32(&mut self) -> ParseResult<u32> {
        let chunk = self.take(4)?;
        Ok(self.endian.u32([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    /// Read the next element, handling the small-element form and padding.
    pub fn next_element(&mut self) -> ParseResult<Element<'a>> {
        let first = self.read_u32()?;

        // Small data element: byte count in the upper half, payload in 4 bytes.
        if first >> 16 != 0 {
            let data_type = first & 0xFFFF;
            let len = (first >> 16) as usize;
            if len > 4 {
                return Err(format!("small data element claims {len} bytes (max 4)"));
            }
            let chunk = self.take(4)?;
            return Ok(Element {
                data_type,
                data: &chunk[..len],
            });
        }

        let data_type = first;
        let len = self.read_u32()? as usize;
        let data = self.take(len)?;

        // Compressed payloads are not padded.
        if data_type != MI_COMPRESSED {
            let padding = (8 - len % 8) % 8;
            self.pos = (self.pos + padding).min(self.bytes.len());
        }

        Ok(Element { data_type, data })
    }
}

/// Inflate a `miCOMPRESSED` payload.
pub(crate) fn inflate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|source| format!("failed to inflate compressed element: {source}"))?;
    Ok(out)
}

fn storage_width(data_type: u32) -> Option<usize> {
    match data_type {
        MI_INT8 | MI_UINT8 | MI_UTF8 => Some(1),
        MI_INT16 | MI_UINT16 | MI_UTF16 => Some(2),
        MI_INT32 | MI_UINT32 | MI_SINGLE | MI_UTF32 => Some(4),
        MI_DOUBLE | MI_INT64 | MI_UINT64 => Some(8),
        _ => None,
    }
}

fn checked_chunks<'a>(element: &Element<'a>, what: &str) -> ParseResult<(usize, &'a [u8])> {
    let width = storage_width(element.data_type)
        .ok_or_else(|| format!("unsupported storage type {} for {what}", element.data_type))?;
    if element.data.len() % width != 0 {
        return Err(format!(
            "{what} payload of {} byte(s) is not a multiple of {width}",
            element.data.len()
        ));
    }
    Ok((width, element.data))
}

/// Decode any numeric storage type into `f64` values.
pub(crate) fn decode_numeric(element: &Element<'_>, endian: Endian) -> ParseResult<Vec<f64>> {
    let (width, data) = checked_chunks(element, "numeric data")?;
    let values = data
        .chunks_exact(width)
        .map(|c| match element.data_type {
            MI_INT8 => c[0] as i8 as f64,
            MI_UINT8 | MI_UTF8 => c[0] as f64,
            MI_INT16 => endian.u16([c[0], c[1]]) as i16 as f64,
            MI_UINT16 | MI_UTF16 => endian.u16([c[0], c[1]]) as f64,
            MI_INT32 => endian.u32([c[0], c[1], c[2], c[3]]) as i32 as f64,
            MI_UINT32 | MI_UTF32 => endian.u32([c[0], c[1], c[2], c[3]]) as f64,
            MI_SINGLE => f32::from_bits(endian.u32([c[0], c[1], c[2], c[3]])) as f64,
            MI_INT64 => endian.u64(eight(c)) as i64 as f64,
            MI_UINT64 => endian.u64(eight(c)) as f64,
            _ => f64::from_bits(endian.u64(eight(c))),
        })
        .collect();
    Ok(values)
}

/// Decode the characters of a char array payload.
pub(crate) fn decode_chars(element: &Element<'_>, endian: Endian) -> ParseResult<Vec<char>> {
    match element.data_type {
        MI_UTF8 | MI_INT8 | MI_UINT8 => std::str::from_utf8(element.data)
            .map(|text| text.chars().collect())
            .map_err(|source| format!("char data is not valid UTF-8: {source}")),
        MI_UTF16 | MI_UINT16 | MI_INT16 => {
            let (_, data) = checked_chunks(element, "char data")?;
            let units = data
                .chunks_exact(2)
                .map(|c| endian.u16([c[0], c[1]]))
                .collect::<Vec<_>>();
            char::decode_utf16(units)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| format!("char data is not valid UTF-16: {source}"))
        }
        MI_UTF32 | MI_UINT32 | MI_INT32 => {
            let (_, data) = checked_chunks(element, "char data")?;
            data.chunks_exact(4)
                .map(|c| {
                    let code = endian.u32([c[0], c[1], c[2], c[3]]);
                    char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#x}"))
                })
                .collect()
        }
        other => Err(format!("unsupported storage type {other} for char data")),
    }
}

/// Decode an `miINT32` element into non-negative sizes.
pub(crate) fn decode_dims(element: &Element<'_>, endian: Endian) -> ParseResult<Vec<usize>> {
    if element.data_type != MI_INT32 {
        return Err(format!(
            "dimensions stored as type {} (expected miINT32)",
            element.data_type
        ));
    }
    let (_, data) = checked_chunks(element, "dimensions")?;
    if data.len() < 8 {
        return Err("array has fewer than two dimensions".to_string());
    }
    data.chunks_exact(4)
        .map(|c| {
            let dim = endian.u32([c[0], c[1], c[2], c[3]]) as i32;
            usize::try_from(dim).map_err(|_| format!("negative dimension {dim}"))
        })
        .collect()
}

fn eight(c: &[u8]) -> [u8; 8] {
    [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]
}
