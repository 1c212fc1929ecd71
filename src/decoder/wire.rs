//! Protobuf wire-format primitives
//!
//! Only the subset the comment payload uses: varints, fixed 32/64-bit
//! scalars and length-delimited fields. Groups are rejected.

use crate::decoder::FormatError;

/// Wire type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_bits(bits: u8) -> Result<Self, FormatError> {
        match bits {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(FormatError::UnsupportedWireType(other)),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }
}

/// Cursor over a byte slice
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_varint(&mut self) -> Result<u64, FormatError> {
        let start = self.pos;
        let mut value: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or(FormatError::Truncated { offset: start })?;
            self.pos += 1;

            // The tenth byte may only carry the single remaining bit.
            if shift == 63 && byte > 1 {
                return Err(FormatError::VarintOverflow { offset: start });
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::VarintOverflow { offset: start })
    }

    /// Reads a field key, returning the field number and wire type
    pub fn read_key(&mut self) -> Result<(u32, WireType), FormatError> {
        let offset = self.pos;
        let key = self.read_varint()?;
        let field = key >> 3;
        if field == 0 || field > u64::from(u32::MAX >> 3) {
            return Err(FormatError::InvalidFieldNumber { offset });
        }
        let wire_type = WireType::from_bits((key & 0x7) as u8)?;
        Ok((field as u32, wire_type))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], FormatError> {
        let offset = self.pos;
        let len = self.read_varint()?;
        let remaining = self.buf.len() - self.pos;
        if len > remaining as u64 {
            return Err(FormatError::LengthOverrun {
                offset,
                declared: len,
                remaining,
            });
        }
        let len = len as usize;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String, FormatError> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidUtf8 { offset })
    }

    fn advance(&mut self, n: usize) -> Result<(), FormatError> {
        if self.buf.len() - self.pos < n {
            return Err(FormatError::Truncated { offset: self.pos });
        }
        self.pos += n;
        Ok(())
    }

    /// Skips the value of a field we do not interpret
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), FormatError> {
        match wire_type {
            WireType::Varint => self.read_varint().map(|_| ()),
            WireType::Fixed64 => self.advance(8),
            WireType::LengthDelimited => self.read_bytes().map(|_| ()),
            WireType::Fixed32 => self.advance(4),
        }
    }
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn write_key(out: &mut Vec<u8>, field: u32, wire_type: WireType) {
    write_varint(out, (u64::from(field) << 3) | u64::from(wire_type.bits()));
}

pub fn write_bytes(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    write_key(out, field, WireType::LengthDelimited);
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}
