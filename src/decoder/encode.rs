//! Encoder for the segment grammar
//!
//! Upstream owns the real encoder; this one exists to build fixtures and to
//! check the decoder against known input. Zero and empty values are omitted,
//! as proto3 does.

use crate::decoder::wire::{write_bytes, write_key, write_varint, WireType};
use crate::decoder::{CommentRecord, REPLY_ELEMS};

/// Encodes comments into a segment payload
pub fn encode_segment(records: &[CommentRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        write_bytes(&mut out, REPLY_ELEMS, &encode_comment(record));
    }
    out
}

fn encode_comment(record: &CommentRecord) -> Vec<u8> {
    let mut out = Vec::new();
    // Negative int32 values are sign-extended to ten bytes on the wire.
    put_varint(&mut out, 1, record.id as u64);
    put_varint(&mut out, 2, i64::from(record.offset_ms) as u64);
    put_varint(&mut out, 3, i64::from(record.display_mode) as u64);
    put_varint(&mut out, 4, i64::from(record.font_size) as u64);
    put_varint(&mut out, 5, u64::from(record.color));
    put_string(&mut out, 6, &record.author_hash);
    put_string(&mut out, 7, &record.text);
    put_varint(&mut out, 8, record.post_time as u64);
    put_varint(&mut out, 9, i64::from(record.weight) as u64);
    put_varint(&mut out, 11, i64::from(record.pool) as u64);
    out
}

fn put_varint(out: &mut Vec<u8>, field: u32, value: u64) {
    if value != 0 {
        write_key(out, field, WireType::Varint);
        write_varint(out, value);
    }
}

fn put_string(out: &mut Vec<u8>, field: u32, value: &str) {
    if !value.is_empty() {
        write_bytes(out, field, value.as_bytes());
    }
}
