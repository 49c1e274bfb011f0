//! NPY members and the NPZ archive holding them.
//!
//! Only what results need: little-endian `f8` arrays of up to two
//! dimensions (trailing unit axes are folded away on read), `f4`/`i4`/`i8`
//! arrays read as `f64`, and 0-d unicode strings.

use crate::{PersistError, ResultValue};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;
/// Upper bound on the buffer reserved up front for one archive member.
const MAX_PREALLOC: usize = 1 << 20;

/// Serialize one value as an NPY v1.0 member.
pub fn write_npy<W: Write>(value: &ResultValue, out: &mut W) -> io::Result<()> {
    let (descr, shape, data) = match value {
        ResultValue::Scalar(v) => (
            "<f8".to_string(),
            "()".to_string(),
            v.to_le_bytes().to_vec(),
        ),
        ResultValue::Matrix(m) => {
            let mut data = Vec::with_capacity(m.len() * 8);
            for row in m.row_iter() {
                for v in row.iter() {
                    data.extend_from_slice(&v.to_le_bytes());
                }
            }
            (
                "<f8".to_string(),
                format!("({}, {})", m.nrows(), m.ncols()),
                data,
            )
        }
        ResultValue::Text(s) => {
            let chars: Vec<char> = s.chars().collect();
            let width = chars.len().max(1);
            let mut data = Vec::with_capacity(width * 4);
            for c in &chars {
                data.extend_from_slice(&u32::from(*c).to_le_bytes());
            }
            data.resize(width * 4, 0);
            (format!("<U{width}"), "()".to_string(), data)
        }
    };

    let mut header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}");
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((ALIGN - unpadded % ALIGN) % ALIGN));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "npy header too long"))?;

    out.write_all(MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_all(&header_len.to_le_bytes())?;
    out.write_all(header.as_bytes())?;
    out.write_all(&data)?;
    Ok(())
}

/// Parse one NPY member. `member` names it in errors.
pub fn read_npy(bytes: &[u8], member: &str) -> Result<ResultValue, PersistError> {
    let fail = |reason: &str| PersistError::Npy {
        member: member.to_string(),
        reason: reason.to_string(),
    };
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(fail("missing NPY magic"));
    }
    let (header_len, start) = match bytes[6] {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => return Err(fail(&format!("unsupported NPY version {v}"))),
    };
    let header = bytes
        .get(start..start + header_len)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| fail("truncated header"))?;
    let data = &bytes[start + header_len..];

    let descr = dict_str(header, "descr").ok_or_else(|| fail("no descr"))?;
    let fortran = header.contains("'fortran_order': True");
    let mut shape = dict_shape(header).ok_or_else(|| fail("no shape"))?;
    while shape.len() > 2 && shape.last() == Some(&1) {
        shape.pop();
    }

    if let Some(width) = descr.strip_prefix("<U") {
        let width: usize = width.parse().map_err(|_| fail("bad unicode width"))?;
        if !shape.is_empty() {
            return Err(fail("only 0-d strings are supported"));
        }
        let len = width.checked_mul(4).ok_or_else(|| fail("bad unicode width"))?;
        let raw = data.get(..len).ok_or_else(|| fail("truncated data"))?;
        let text: String = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .take_while(|&u| u != 0)
            .filter_map(char::from_u32)
            .collect();
        return Ok(ResultValue::Text(text));
    }

    let count = shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| fail(&format!("shape {shape:?} overflows")))?;
    let values = decode_numbers(descr, data, count)
        .ok_or_else(|| fail(&format!("unsupported or truncated {descr} data")))?;

    match shape.as_slice() {
        [] => Ok(ResultValue::Scalar(values[0])),
        [n] => Ok(ResultValue::Matrix(DMatrix::from_row_slice(1, *n, &values))),
        [r, c] if fortran => Ok(ResultValue::Matrix(DMatrix::from_column_slice(*r, *c, &values))),
        [r, c] => Ok(ResultValue::Matrix(DMatrix::from_row_slice(*r, *c, &values))),
        _ => Err(fail(&format!("unsupported shape {shape:?}"))),
    }
}

fn decode_numbers(descr: &str, data: &[u8], count: usize) -> Option<Vec<f64>> {
    let size = match descr {
        "<f8" | "<i8" => 8,
        "<f4" | "<i4" => 4,
        _ => return None,
    };
    let chunks = data.get(..count.checked_mul(size)?)?.chunks_exact(size);
    Some(match descr {
        "<f8" => chunks.map(|b| f64::from_le_bytes(le_bytes(b))).collect(),
        "<i8" => chunks.map(|b| i64::from_le_bytes(le_bytes(b)) as f64).collect(),
        "<f4" => chunks.map(|b| f64::from(f32::from_le_bytes(le_bytes(b)))).collect(),
        _ => chunks.map(|b| f64::from(i32::from_le_bytes(le_bytes(b)))).collect(),
    })
}

fn le_bytes<const N: usize>(b: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(b);
    out
}

fn dict_str<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = &header[header.find(&format!("'{key}':"))? + key.len() + 3..];
    let open = rest.find('\'')? + 1;
    let close = open + rest[open..].find('\'')?;
    Some(&rest[open..close])
}

fn dict_shape(header: &str) -> Option<Vec<usize>> {
    let rest = &header[header.find("'shape':")?..];
    let open = rest.find('(')? + 1;
    let close = open + rest[open..].find(')')?;
    rest[open..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('L').parse().ok())
        .collect()
}

pub(crate) fn write_npz(entries: &[(String, ResultValue)], path: &Path) -> Result<(), PersistError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (key, value) in entries {
        zip.start_file(format!("{key}.npy"), options)?;
        write_npy(value, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

pub(crate) fn read_npz(path: &Path) -> Result<Vec<(String, ResultValue)>, PersistError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        let Some(key) = name.strip_suffix(".npy") else {
            log::warn!("ignoring non-npy member `{name}` in {}", path.display());
            continue;
        };
        let mut buf = Vec::with_capacity((file.size() as usize).min(MAX_PREALLOC));
        file.read_to_end(&mut buf)?;
        out.push((key.to_string(), read_npy(&buf, &name)?));
    }
    Ok(out)
}
