//! Binary comment-segment decoder
//!
//! A segment payload is a protobuf reply whose field 1 repeats one
//! length-prefixed message per comment. Decoding is a pure function of the
//! input bytes: no state is kept between calls, so segments may be decoded
//! concurrently from any number of callers.
//!
//! | Field | Comment attribute | Wire type |
//! |-------|-------------------|-----------|
//! | 1 | `id` | varint (int64) |
//! | 2 | `offset_ms` | varint (int32) |
//! | 3 | `display_mode` | varint (int32) |
//! | 4 | `font_size` | varint (int32) |
//! | 5 | `color` | varint (uint32) |
//! | 6 | `author_hash` | length-delimited (string) |
//! | 7 | `text` | length-delimited (string) |
//! | 8 | `post_time` | varint (int64) |
//! | 9 | `weight` | varint (int32) |
//! | 11 | `pool` | varint (int32) |
//!
//! Any other field, at either level, is skipped by wire type.

mod encode;
mod wire;

pub use encode::encode_segment;
pub use wire::WireType;

use serde::Serialize;
use thiserror::Error;
use wire::WireReader;

/// Field number of the repeated comment message in the reply
const REPLY_ELEMS: u32 = 1;

/// Grammar violations found while decoding a segment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("payload truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("varint at byte {offset} exceeds 64 bits")]
    VarintOverflow { offset: usize },

    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),

    #[error("invalid field number at byte {offset}")]
    InvalidFieldNumber { offset: usize },

    #[error("field {field} has wire type {found:?}, expected {expected:?}")]
    WireTypeMismatch {
        field: u32,
        expected: WireType,
        found: WireType,
    },

    #[error("length {declared} at byte {offset} exceeds the {remaining} bytes remaining")]
    LengthOverrun {
        offset: usize,
        declared: u64,
        remaining: usize,
    },

    #[error("string at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },
}

/// One decoded comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    /// Upstream comment id
    pub id: i64,
    /// Position in the video, milliseconds
    pub offset_ms: i32,
    pub text: String,
    /// Scrolling, top, bottom, ...
    pub display_mode: i32,
    pub font_size: i32,
    /// 24-bit RGB
    pub color: u32,
    /// Unix seconds
    pub post_time: i64,
    pub weight: i32,
    pub pool: i32,
    /// Hashed author id
    pub author_hash: String,
}

impl CommentRecord {
    /// Offset into the video in seconds
    pub fn offset_secs(&self) -> f64 {
        f64::from(self.offset_ms) / 1000.0
    }
}

/// Decodes one segment payload into its comments, in payload order
///
/// # Arguments
///
/// * `bytes` - Raw segment bytes exactly as received from upstream
///
/// # Returns
///
/// * `Ok(Vec<CommentRecord>)` - Every comment in the payload (possibly none)
/// * `Err(FormatError)` - The payload does not follow the record grammar
pub fn decode_segment(bytes: &[u8]) -> Result<Vec<CommentRecord>, FormatError> {
    let mut reader = WireReader::new(bytes);
    let mut records = Vec::new();

    while !reader.is_empty() {
        let (field, wire_type) = reader.read_key()?;
        if field == REPLY_ELEMS {
            expect(field, WireType::LengthDelimited, wire_type)?;
            let body = reader.read_bytes()?;
            let body_start = reader.position() - body.len();
            records.push(decode_comment(body, body_start)?);
        } else {
            reader.skip(wire_type)?;
        }
    }

    Ok(records)
}

fn decode_comment(body: &[u8], base: usize) -> Result<CommentRecord, FormatError> {
    let mut reader = WireReader::new(body);
    let mut record = CommentRecord::default();

    while !reader.is_empty() {
        let (field, wire_type) = reader
            .read_key()
            .map_err(|e| rebase(e, base))?;
        let result = match field {
            1 => varint(&mut reader, field, wire_type).map(|v| record.id = v as i64),
            2 => varint(&mut reader, field, wire_type).map(|v| record.offset_ms = v as i32),
            3 => varint(&mut reader, field, wire_type).map(|v| record.display_mode = v as i32),
            4 => varint(&mut reader, field, wire_type).map(|v| record.font_size = v as i32),
            5 => varint(&mut reader, field, wire_type).map(|v| record.color = v as u32),
            6 => string(&mut reader, field, wire_type).map(|s| record.author_hash = s),
            7 => string(&mut reader, field, wire_type).map(|s| record.text = s),
            8 => varint(&mut reader, field, wire_type).map(|v| record.post_time = v as i64),
            9 => varint(&mut reader, field, wire_type).map(|v| record.weight = v as i32),
            11 => varint(&mut reader, field, wire_type).map(|v| record.pool = v as i32),
            _ => reader.skip(wire_type),
        };
        result.map_err(|e| rebase(e, base))?;
    }

    Ok(record)
}

fn expect(field: u32, expected: WireType, found: WireType) -> Result<(), FormatError> {
    if expected == found {
        Ok(())
    } else {
        Err(FormatError::WireTypeMismatch {
            field,
            expected,
            found,
        })
    }
}

fn varint(reader: &mut WireReader<'_>, field: u32, wire_type: WireType) -> Result<u64, FormatError> {
    expect(field, WireType::Varint, wire_type)?;
    reader.read_varint()
}

fn string(
    reader: &mut WireReader<'_>,
    field: u32,
    wire_type: WireType,
) -> Result<String, FormatError> {
    expect(field, WireType::LengthDelimited, wire_type)?;
    reader.read_string()
}

/// Converts offsets inside a nested message into offsets within the whole payload.
///
/// `base` is the payload offset of the nested message's first body byte.
fn rebase(error: FormatError, base: usize) -> FormatError {
    let shift = |offset: usize| base + offset;
    match error {
        FormatError::Truncated { offset } => FormatError::Truncated {
            offset: shift(offset),
        },
        FormatError::VarintOverflow { offset } => FormatError::VarintOverflow {
            offset: shift(offset),
        },
        FormatError::InvalidFieldNumber { offset } => FormatError::InvalidFieldNumber {
            offset: shift(offset),
        },
        FormatError::LengthOverrun {
            offset,
            declared,
            remaining,
        } => FormatError::LengthOverrun {
            offset: shift(offset),
            declared,
            remaining,
        },
        FormatError::InvalidUtf8 { offset } => FormatError::InvalidUtf8 {
            offset: shift(offset),
        },
        other => other,
    }
}
