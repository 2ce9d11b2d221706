//! MATLAB Level-5 (`.mat` v5/v7) container reading and writing.
//!
//! Only what StAMPS exports need is supported: numeric `miMATRIX` variables,
//! optionally wrapped in zlib-compressed elements, in either byte order.
//! Cell, struct, char and sparse variables are skipped.
//!
//! Layout:
//! ```text
//!  ┌──────────────────────────── 128-byte header ────────────────────────────┐
//!  │ 116 text │ 8 subsys offset │ 2 version │ 2 endian indicator ("IM"/"MI") │
//!  └──────────────────────────────────────────────────────────────────────────┘
//!  ┌ tag: type u32 │ nbytes u32 ┐┌ data (padded to 8) ┐ ... repeated
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, warn};

use crate::error::{PipelineError, Result};

const HEADER_LEN: usize = 128;
const HEADER_TEXT_LEN: usize = 116;
const VERSION: u16 = 0x0100;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// Array classes
const MX_DOUBLE_CLASS: u8 = 6;
const MX_UINT64_CLASS: u8 = 15;
const MX_COMPLEX_FLAG: u32 = 0x0800;

// ---------------------------------------------------------------------------
// MatArray – one named numeric variable
// ---------------------------------------------------------------------------

/// A numeric variable, converted to `f64`, stored column-major as in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatArray {
    pub name: String,
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

impl MatArray {
    /// Build from row-major values (the natural order for Rust callers).
    pub fn from_row_major(name: &str, rows: usize, cols: usize, values: &[f64]) -> Self {
        let mut data = vec![0.0; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                data[c * rows + r] = values[r * cols + c];
            }
        }
        MatArray {
            name: name.to_string(),
            dims: vec![rows, cols],
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Trailing dimensions are folded into columns.
    pub fn cols(&self) -> usize {
        self.dims.iter().skip(1).fold(1usize, |acc, &d| acc.saturating_mul(d))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows() + row]
    }

    /// True for `1×M`, `M×1` and scalars.
    pub fn is_vector(&self) -> bool {
        self.rows() <= 1 || self.cols() <= 1
    }

    /// Values of one row, in column order.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.cols()).map(|c| self.get(row, c)).collect()
    }

    /// Row-major copy of the whole matrix.
    pub fn to_row_major(&self) -> Vec<f64> {
        let (rows, cols) = (self.rows(), self.cols());
        let mut out = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                out.push(self.get(r, c));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// MatFile – all numeric variables of one container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MatFile {
    /// Identity used in error messages (usually the file name).
    pub name: String,
    arrays: BTreeMap<String, MatArray>,
}

impl MatFile {
    /// Read and decode a container from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(&name, &bytes)
    }

    /// Decode a container already held in memory.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let invalid = |reason: &str| PipelineError::InvalidContainer {
            container: name.to_string(),
            reason: reason.to_string(),
        };

        if bytes.len() < HEADER_LEN {
            return Err(invalid("shorter than the 128-byte header"));
        }
        let text = String::from_utf8_lossy(&bytes[..HEADER_TEXT_LEN]);
        if text.contains("MATLAB 7.3") {
            return Err(invalid("v7.3 (HDF5) containers are not supported"));
        }
        let big_endian = match &bytes[126..128] {
            b"IM" => false,
            b"MI" => true,
            _ => return Err(invalid("missing endian indicator")),
        };
        let version = if big_endian {
            BigEndian::read_u16(&bytes[124..126])
        } else {
            LittleEndian::read_u16(&bytes[124..126])
        };
        debug!(
            "{name}: MAT header version {version:#06x}, {} endian",
            if big_endian { "big" } else { "little" }
        );

        let mut arrays = BTreeMap::new();
        let mut reader = ElementReader::new(name, &bytes[HEADER_LEN..], big_endian);
        while let Some(element) = reader.next_element()? {
            let matrix = match element.ty {
                MI_COMPRESSED => {
                    let inflated = inflate(name, &element.data)?;
                    let mut inner = ElementReader::new(name, &inflated, big_endian);
                    let wrapped = inner.next_element()?;
                    match wrapped {
                        Some(e) if e.ty == MI_MATRIX => parse_matrix(name, &e.data, big_endian)?,
                        Some(e) => {
                            debug!("{name}: skipping compressed element of type {}", e.ty);
                            None
                        }
                        None => None,
                    }
                }
                MI_MATRIX => parse_matrix(name, &element.data, big_endian)?,
                other => {
                    debug!("{name}: skipping top-level element of type {other}");
                    None
                }
            };
            if let Some(array) = matrix {
                debug!("{name}: read '{}' {:?}", array.name, array.dims);
                arrays.insert(array.name.clone(), array);
            }
        }

        Ok(MatFile {
            name: name.to_string(),
            arrays,
        })
    }

    pub fn get(&self, field: &str) -> Option<&MatArray> {
        self.arrays.get(field)
    }

    /// Like [`get`](Self::get) but absent fields are a `MissingField` error.
    pub fn require(&self, field: &str) -> Result<&MatArray> {
        self.get(field)
            .ok_or_else(|| PipelineError::missing(field, &self.name))
    }

    /// Variable names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Element decoding
// ---------------------------------------------------------------------------

struct Element<'a> {
    ty: u32,
    data: Cow<'a, [u8]>,
}

struct ElementReader<'a> {
    container: &'a str,
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ElementReader<'a> {
    fn new(container: &'a str, buf: &'a [u8], big_endian: bool) -> Self {
        Self {
            container,
            buf,
            pos: 0,
            big_endian,
        }
    }

    fn invalid(&self, reason: String) -> PipelineError {
        PipelineError::InvalidContainer {
            container: self.container.to_string(),
            reason,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                self.invalid(format!(
                    "element of {n} bytes at offset {} runs past the end",
                    self.pos
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(if self.big_endian {
            BigEndian::read_u32(bytes)
        } else {
            LittleEndian::read_u32(bytes)
        })
    }

    /// Next data element, or `None` once fewer than a tag's worth of bytes remain.
    fn next_element(&mut self) -> Result<Option<Element<'a>>> {
        if self.buf.len() - self.pos < 8 {
            return Ok(None);
        }
        let first = self.read_u32()?;

        // Small data element: nbytes in the upper half, payload in the tag.
        if first >> 16 != 0 {
            let ty = first & 0xffff;
            let nbytes = (first >> 16) as usize;
            if nbytes > 4 {
                return Err(self.invalid(format!("small element claims {nbytes} bytes")));
            }
            let payload = self.take(4)?;
            return Ok(Some(Element {
                ty,
                data: Cow::Borrowed(&payload[..nbytes]),
            }));
        }

        let ty = first;
        let nbytes = self.read_u32()? as usize;
        let data = self.take(nbytes)?;
        if ty != MI_COMPRESSED {
            let padding = (8 - nbytes % 8) % 8;
            self.pos = (self.pos + padding).min(self.buf.len());
        }
        Ok(Some(Element {
            ty,
            data: Cow::Borrowed(data),
        }))
    }

    fn expect(&mut self, what: &str) -> Result<Element<'a>> {
        self.next_element()?
            .ok_or_else(|| self.invalid(format!("matrix ends before its {what}")))
    }
}

fn inflate(container: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PipelineError::InvalidContainer {
            container: container.to_string(),
            reason: format!("corrupt compressed element: {e}"),
        })?;
    Ok(out)
}

/// Decode one `miMATRIX` body. Returns `None` for non-numeric classes.
fn parse_matrix(container: &str, body: &[u8], big_endian: bool) -> Result<Option<MatArray>> {
    if body.is_empty() {
        return Ok(None);
    }
    let mut reader = ElementReader::new(container, body, big_endian);

    let flags = reader.expect("array flags")?;
    if flags.ty != MI_UINT32 || flags.data.len() < 4 {
        return Err(reader.invalid("malformed array flags".to_string()));
    }
    let flag_word = if big_endian {
        BigEndian::read_u32(&flags.data)
    } else {
        LittleEndian::read_u32(&flags.data)
    };
    let class = (flag_word & 0xff) as u8;

    let dims_element = reader.expect("dimensions")?;
    let dims = decode_numeric(dims_element.ty, &dims_element.data, big_endian)
        .ok_or_else(|| reader.invalid("malformed dimensions".to_string()))?
        .into_iter()
        .map(|d| {
            if d >= 0.0 {
                Ok(d as usize)
            } else {
                Err(reader.invalid(format!("negative dimension {d}")))
            }
        })
        .collect::<Result<Vec<usize>>>()?;

    let name_element = reader.expect("name")?;
    let name = String::from_utf8_lossy(&name_element.data).into_owned();

    if !(MX_DOUBLE_CLASS..=MX_UINT64_CLASS).contains(&class) {
        debug!("{container}: skipping non-numeric variable '{name}' (class {class})");
        return Ok(None);
    }
    if flag_word & MX_COMPLEX_FLAG != 0 {
        warn!("{container}: variable '{name}' is complex, keeping the real part");
    }

    let real = reader.expect("real part")?;
    let data = decode_numeric(real.ty, &real.data, big_endian).ok_or_else(|| {
        reader.invalid(format!(
            "variable '{name}' has unsupported storage type {}",
            real.ty
        ))
    })?;

    let expected = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| reader.invalid(format!("variable '{name}' has oversized dimensions {dims:?}")))?;
    if data.len() != expected {
        return Err(reader.invalid(format!(
            "variable '{name}' holds {} values for dimensions {dims:?}",
            data.len()
        )));
    }

    Ok(Some(MatArray { name, dims, data }))
}

fn decode_numeric(ty: u32, bytes: &[u8], big_endian: bool) -> Option<Vec<f64>> {
    if big_endian {
        decode_numeric_as::<BigEndian>(ty, bytes)
    } else {
        decode_numeric_as::<LittleEndian>(ty, bytes)
    }
}

/// Storage may be narrower than the array class; everything widens to `f64`.
fn decode_numeric_as<B: ByteOrder>(ty: u32, bytes: &[u8]) -> Option<Vec<f64>> {
    let values = match ty {
        MI_INT8 => bytes.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => bytes.iter().map(|&b| b as f64).collect(),
        MI_INT16 => bytes.chunks_exact(2).map(|c| B::read_i16(c) as f64).collect(),
        MI_UINT16 => bytes.chunks_exact(2).map(|c| B::read_u16(c) as f64).collect(),
        MI_INT32 => bytes.chunks_exact(4).map(|c| B::read_i32(c) as f64).collect(),
        MI_UINT32 => bytes.chunks_exact(4).map(|c| B::read_u32(c) as f64).collect(),
        MI_SINGLE => bytes.chunks_exact(4).map(|c| B::read_f32(c) as f64).collect(),
        MI_DOUBLE => bytes.chunks_exact(8).map(B::read_f64).collect(),
        MI_INT64 => bytes.chunks_exact(8).map(|c| B::read_i64(c) as f64).collect(),
        MI_UINT64 => bytes.chunks_exact(8).map(|c| B::read_u64(c) as f64).collect(),
        _ => return None,
    };
    Some(values)
}

// ---------------------------------------------------------------------------
// Writer (reference datasets and tests)
// ---------------------------------------------------------------------------

/// Little-endian MAT v5 writer for `double` matrices.
pub struct MatWriter {
    buf: Vec<u8>,
    compress: bool,
}

impl MatWriter {
    pub fn new() -> Self {
        let mut text = format!(
            "MATLAB 5.0 MAT-file, Platform: {}, Created by: psinsar {}",
            std::env::consts::OS,
            env!("CARGO_PKG_VERSION")
        )
        .into_bytes();
        text.resize(HEADER_TEXT_LEN, b' ');

        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&text);
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(b"IM");
        Self {
            buf,
            compress: false,
        }
    }

    /// Wrap every following variable in a zlib-compressed element.
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Append a `rows × cols` double matrix given in row-major order.
    pub fn write_matrix(&mut self, name: &str, rows: usize, cols: usize, values: &[f64]) -> Result<()> {
        if values.len() != rows * cols {
            return Err(PipelineError::shape(
                format!("values for '{name}'"),
                rows * cols,
                values.len(),
            ));
        }
        let array = MatArray::from_row_major(name, rows, cols, values);
        let mut real = Vec::with_capacity(array.data.len() * 8);
        for v in &array.data {
            real.write_f64::<LittleEndian>(*v).map_err(mem_io)?;
        }
        let element = matrix_element(name, &array.dims, MX_DOUBLE_CLASS, MI_DOUBLE, &real)
            .map_err(mem_io)?;
        self.append(element)
    }

    /// Append a `1 × n` row vector.
    pub fn write_row(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.write_matrix(name, 1, values.len(), values)
    }

    /// Append an `n × 1` column vector.
    pub fn write_column(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.write_matrix(name, values.len(), 1, values)
    }

    pub fn write_scalar(&mut self, name: &str, value: f64) -> Result<()> {
        self.write_matrix(name, 1, 1, &[value])
    }

    fn append(&mut self, element: Vec<u8>) -> Result<()> {
        if self.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&element).map_err(mem_io)?;
            let packed = encoder.finish().map_err(mem_io)?;
            write_tag(&mut self.buf, MI_COMPRESSED, packed.len()).map_err(mem_io)?;
            self.buf.extend_from_slice(&packed);
        } else {
            self.buf.extend_from_slice(&element);
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_to(self, path: &Path) -> Result<()> {
        std::fs::write(path, self.finish()).map_err(|e| PipelineError::io(path, e))
    }
}

impl Default for MatWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn mem_io(e: std::io::Error) -> PipelineError {
    PipelineError::io("<memory>", e)
}

fn write_tag(out: &mut Vec<u8>, ty: u32, nbytes: usize) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(ty)?;
    out.write_u32::<LittleEndian>(nbytes as u32)
}

fn write_padded(out: &mut Vec<u8>, ty: u32, data: &[u8]) -> std::io::Result<()> {
    write_tag(out, ty, data.len())?;
    out.extend_from_slice(data);
    out.resize(out.len() + (8 - data.len() % 8) % 8, 0);
    Ok(())
}

/// Full `miMATRIX` element (tag included) with the given real-part storage.
fn matrix_element(
    name: &str,
    dims: &[usize],
    class: u8,
    storage: u32,
    real: &[u8],
) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();

    let mut flags = Vec::with_capacity(8);
    flags.write_u32::<LittleEndian>(class as u32)?;
    flags.write_u32::<LittleEndian>(0)?;
    write_padded(&mut body, MI_UINT32, &flags)?;

    let mut dim_bytes = Vec::with_capacity(dims.len() * 4);
    for &d in dims {
        dim_bytes.write_i32::<LittleEndian>(d as i32)?;
    }
    write_padded(&mut body, MI_INT32, &dim_bytes)?;
    write_padded(&mut body, MI_INT8, name.as_bytes())?;
    write_padded(&mut body, storage, real)?;

    let mut element = Vec::with_capacity(body.len() + 8);
    write_tag(&mut element, MI_MATRIX, body.len())?;
    element.extend_from_slice(&body);
    Ok(element)
}
