//! GPMF Key-Length-Value framing
//!
//! Every entry starts with an 8-byte header:
//! - key (4 bytes): FourCC
//! - type (1 byte): element type character, 0 for a nested container
//! - struct size (1 byte): bytes per sample
//! - repeat (2 bytes, big-endian): number of samples
//!
//! followed by `struct size * repeat` bytes of big-endian data, padded to a
//! 4-byte boundary.

use log::{debug, trace};

use super::FourCC;
use crate::error::DecodeError;

pub const HEADER_LEN: usize = 8;

/// Nested KLV sequence (DEVC, STRM)
pub const CONTAINER: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KlvHeader {
    pub key: FourCC,
    pub type_char: u8,
    pub struct_size: u8,
    pub repeat: u16,
}

impl KlvHeader {
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self, DecodeError> {
        let available = bytes.len().saturating_sub(offset);
        if available < HEADER_LEN {
            return Err(DecodeError::Truncated {
                offset,
                needed: HEADER_LEN,
                available,
            });
        }

        let h = &bytes[offset..offset + HEADER_LEN];
        let key = FourCC([h[0], h[1], h[2], h[3]]);
        if !key.is_valid() {
            return Err(DecodeError::InvalidKey { key: key.0, offset });
        }

        Ok(Self {
            key,
            type_char: h[4],
            struct_size: h[5],
            repeat: u16::from_be_bytes([h[6], h[7]]),
        })
    }

    pub fn data_len(&self) -> usize {
        self.struct_size as usize * self.repeat as usize
    }

    pub fn padded_len(&self) -> usize {
        (self.data_len() + 3) & !3
    }

    pub fn is_container(&self) -> bool {
        self.type_char == CONTAINER
    }
}

/// Decoded leaf payload
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// One row per sample, one column per struct element
    Numbers(Vec<Vec<f64>>),
    /// ASCII strings and `U` dates
    Text(Vec<String>),
    Keys(Vec<FourCC>),
    /// GUIDs, nested-type arrays and anything else we don't interpret
    Raw(Vec<u8>),
}

impl Value {
    pub fn rows(&self) -> Option<&[Vec<f64>]> {
        match self {
            Value::Numbers(rows) => Some(rows),
            _ => None,
        }
    }

    /// All numeric elements in row-major order.
    pub fn flatten(&self) -> Option<Vec<f64>> {
        self.rows()
            .map(|rows| rows.iter().flat_map(|row| row.iter().copied()).collect())
    }

    pub fn first_text(&self) -> Option<&str> {
        match self {
            Value::Text(rows) => rows.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Numbers(_) => "numeric",
            Value::Text(_) => "text",
            Value::Keys(_) => "FourCC",
            Value::Raw(_) => "raw",
        }
    }
}

/// A decoded leaf entry and its byte offset in the source buffer
#[derive(Clone, Debug, PartialEq)]
pub struct KlvEntry {
    pub header: KlvHeader,
    pub offset: usize,
    pub value: Value,
}

/// Walk a GPMF buffer depth-first, returning leaf entries in file order.
pub fn parse_entries(bytes: &[u8]) -> Result<Vec<KlvEntry>, DecodeError> {
    let mut entries = Vec::new();
    walk(bytes, 0, bytes.len(), &mut entries)?;
    debug!("Parsed {} KLV entries from {} bytes", entries.len(), bytes.len());
    Ok(entries)
}

fn walk(
    bytes: &[u8],
    start: usize,
    end: usize,
    out: &mut Vec<KlvEntry>,
) -> Result<(), DecodeError> {
    let window = &bytes[..end];
    let mut offset = start;
    // TYPE applies to the `?` entries that follow it within the same stream
    let mut type_def: Option<Vec<u8>> = None;

    while offset < end {
        let remaining = &window[offset..];
        // a null key (or zero fill too short for one) ends the sequence
        let at_end = match FourCC::from_slice(remaining) {
            Some(key) => key.is_zero(),
            None => remaining.iter().all(|b| *b == 0),
        };
        if at_end {
            break;
        }

        let header = KlvHeader::parse(window, offset)?;
        let data_start = offset + HEADER_LEN;
        let data_end = data_start + header.data_len();
        if data_end > end {
            return Err(DecodeError::Truncated {
                offset,
                needed: HEADER_LEN + header.data_len(),
                available: end - offset,
            });
        }

        if header.is_container() {
            trace!(
                "{} container at {}, {} bytes",
                header.key,
                offset,
                header.data_len()
            );
            walk(bytes, data_start, data_end, out)?;
        } else {
            let data = &bytes[data_start..data_end];
            if header.key == FourCC::TYPE {
                type_def = Some(data.iter().copied().take_while(|b| *b != 0).collect());
            }
            let value = decode_value(&header, data, type_def.as_deref());
            trace!("{} at {}: {} value", header.key, offset, value.type_name());
            out.push(KlvEntry {
                header,
                offset,
                value,
            });
        }

        offset = (data_start + header.padded_len()).min(end);
    }

    Ok(())
}

/// Byte width of a numeric element type.
fn numeric_size(type_char: u8) -> Option<usize> {
    match type_char {
        b'b' | b'B' | b'c' => Some(1),
        b's' | b'S' => Some(2),
        b'l' | b'L' | b'f' | b'q' => Some(4),
        b'd' | b'j' | b'J' | b'Q' => Some(8),
        _ => None,
    }
}

fn read_number(type_char: u8, b: &[u8]) -> Option<f64> {
    Some(match type_char {
        b'b' => *b.first()? as i8 as f64,
        b'B' | b'c' => *b.first()? as f64,
        b's' => i16::from_be_bytes(b.try_into().ok()?) as f64,
        b'S' => u16::from_be_bytes(b.try_into().ok()?) as f64,
        b'l' => i32::from_be_bytes(b.try_into().ok()?) as f64,
        b'L' => u32::from_be_bytes(b.try_into().ok()?) as f64,
        b'f' => f32::from_be_bytes(b.try_into().ok()?) as f64,
        b'd' => f64::from_be_bytes(b.try_into().ok()?),
        b'j' => i64::from_be_bytes(b.try_into().ok()?) as f64,
        b'J' => u64::from_be_bytes(b.try_into().ok()?) as f64,
        // Q15.16 and Q31.32 fixed point
        b'q' => i32::from_be_bytes(b.try_into().ok()?) as f64 / 65_536.0,
        b'Q' => i64::from_be_bytes(b.try_into().ok()?) as f64 / 4_294_967_296.0,
        _ => return None,
    })
}

fn trim_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn decode_value(header: &KlvHeader, data: &[u8], type_def: Option<&[u8]>) -> Value {
    let struct_size = header.struct_size as usize;
    if struct_size == 0 {
        return Value::Raw(Vec::new());
    }

    match header.type_char {
        b'c' if struct_size == 1 => Value::Text(vec![trim_text(data)]),
        b'c' => Value::Text(data.chunks_exact(struct_size).map(trim_text).collect()),
        b'U' => Value::Text(data.chunks_exact(16).map(trim_text).collect()),
        b'F' => Value::Keys(data.chunks_exact(4).filter_map(FourCC::from_slice).collect()),
        b'?' => match type_def.and_then(|def| decode_complex(def, struct_size, data)) {
            Some(rows) => Value::Numbers(rows),
            None => {
                debug!("{}: complex entry without a usable TYPE", header.key);
                Value::Raw(data.to_vec())
            }
        },
        t => match numeric_size(t) {
            Some(size) if struct_size % size == 0 => Value::Numbers(
                data.chunks_exact(struct_size)
                    .map(|row| {
                        row.chunks_exact(size)
                            .filter_map(|b| read_number(t, b))
                            .collect()
                    })
                    .collect(),
            ),
            _ => {
                debug!(
                    "{}: uninterpreted type {:?} (struct size {})",
                    header.key, t as char, struct_size
                );
                Value::Raw(data.to_vec())
            }
        },
    }
}

fn decode_complex(type_def: &[u8], struct_size: usize, data: &[u8]) -> Option<Vec<Vec<f64>>> {
    let sizes: Vec<usize> = type_def
        .iter()
        .map(|t| numeric_size(*t))
        .collect::<Option<_>>()?;
    if sizes.iter().sum::<usize>() != struct_size {
        return None;
    }

    data.chunks_exact(struct_size)
        .map(|row| {
            let mut at = 0;
            type_def
                .iter()
                .zip(&sizes)
                .map(|(t, size)| {
                    let value = read_number(*t, &row[at..at + size]);
                    at += size;
                    value
                })
                .collect::<Option<Vec<f64>>>()
        })
        .collect()
}

/// Build one padded KLV entry.
#[cfg(test)]
pub(crate) fn klv(key: &[u8; 4], type_char: u8, struct_size: u8, repeat: u16, data: &[u8]) -> Vec<u8> {
    let mut out = key.to_vec();
    out.push(type_char);
    out.push(struct_size);
    out.extend_from_slice(&repeat.to_be_bytes());
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

/// Wrap entries in a container.
#[cfg(test)]
pub(crate) fn container(key: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = children.concat();
    klv(key, CONTAINER, 1, body.len() as u16, &body)
}
