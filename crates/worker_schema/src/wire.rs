//! Low-level wire primitives.
//!
//! Schema objects use a protobuf-compatible encoding: every occurrence is
//! prefixed by a varint tag `(field_id << 3) | wire_type`, followed by a
//! varint, a little-endian fixed-width word, or a length-delimited payload.

use crate::error::SchemaError;

/// The four wire types a schema field occurrence can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// Base-128 varint.
    Varint,
    /// 8 little-endian bytes.
    Fixed64,
    /// Varint length followed by that many bytes.
    LengthDelimited,
    /// 4 little-endian bytes.
    Fixed32,
}

impl WireType {
    /// The three-bit code stored in the tag.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }

    /// Parse a wire type from its tag code.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] for group markers and
    /// reserved codes.
    pub fn from_code(code: u32) -> Result<Self, SchemaError> {
        match code {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(SchemaError::Deserialization(format!(
                "unsupported wire type {other}"
            ))),
        }
    }
}

/// Append `value` as a base-128 varint.
pub fn write_varint(value: u64, out: &mut Vec<u8>) {
    let mut v = value;
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

/// Append a field tag.
pub fn write_tag(field_id: u32, wire_type: WireType, out: &mut Vec<u8>) {
    write_varint((u64::from(field_id) << 3) | u64::from(wire_type.code()), out);
}

/// Append a length-delimited payload.
pub fn write_length_delimited(payload: &[u8], out: &mut Vec<u8>) {
    write_varint(payload.len() as u64, out);
    out.extend_from_slice(payload);
}

/// Zig-zag encode a signed 32-bit value.
#[must_use]
pub const fn zigzag_encode32(value: i32) -> u64 {
    (((value << 1) ^ (value >> 31)) as u32) as u64
}

/// Zig-zag decode a 32-bit value.
#[must_use]
pub const fn zigzag_decode32(value: u64) -> i32 {
    let v = value as u32;
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

/// Zig-zag encode a signed 64-bit value.
#[must_use]
pub const fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Zig-zag decode a 64-bit value.
#[must_use]
pub const fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// A forward-only cursor over an encoded buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns `true` once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read a base-128 varint.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if the buffer ends mid-varint
    /// or the varint is longer than ten bytes.
    pub fn read_varint(&mut self) -> Result<u64, SchemaError> {
        let mut result = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.buf.get(self.pos).ok_or_else(|| {
                SchemaError::Deserialization(format!("truncated varint at offset {}", self.pos))
            })?;
            self.pos += 1;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(SchemaError::Deserialization(format!(
            "varint too long at offset {}",
            self.pos
        )))
    }

    /// Read a tag and split it into field id and wire type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] on a malformed tag or a zero
    /// field id.
    pub fn read_tag(&mut self) -> Result<(u32, WireType), SchemaError> {
        let tag = self.read_varint()?;
        let field_id = u32::try_from(tag >> 3).map_err(|_| {
            SchemaError::Deserialization(format!("field id out of range in tag {tag}"))
        })?;
        if field_id == 0 {
            return Err(SchemaError::Deserialization(
                "field id 0 is not allowed".to_string(),
            ));
        }
        let wire_type = WireType::from_code((tag & 0x7) as u32)?;
        Ok((field_id, wire_type))
    }

    /// Read exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if fewer bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SchemaError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(SchemaError::Deserialization(format!(
                "need {len} bytes at offset {}, only {} remain",
                self.pos,
                self.buf.len().saturating_sub(self.pos)
            )));
        };
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a varint length followed by that many bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if the payload is truncated.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], SchemaError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| SchemaError::Deserialization(format!("length {len} overflows")))?;
        self.read_bytes(len)
    }

    /// Read a little-endian 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if fewer than four bytes remain.
    pub fn read_fixed32(&mut self) -> Result<u32, SchemaError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian 64-bit word.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Deserialization`] if fewer than eight bytes remain.
    pub fn read_fixed64(&mut self) -> Result<u64, SchemaError> {
        let bytes = self.read_bytes(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            write_varint(value, &mut buf);
            let mut reader = Reader::new(&buf);
            assert_eq!(reader.read_varint().unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_varint_encoding_is_little_endian_groups() {
        let mut buf = Vec::new();
        write_varint(300, &mut buf);
        assert_eq!(buf, vec![0xac, 0x02]);
    }

    #[test]
    fn test_truncated_varint() {
        let mut reader = Reader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_varint(),
            Err(SchemaError::Deserialization(_))
        ));
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode32(0), 0);
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_decode32(zigzag_encode32(i32::MIN)), i32::MIN);
        assert_eq!(zigzag_decode64(zigzag_encode64(i64::MIN)), i64::MIN);
        assert_eq!(zigzag_decode64(zigzag_encode64(-12345)), -12345);
    }

    #[test]
    fn test_tag_rejects_field_zero_and_groups() {
        let mut buf = Vec::new();
        write_varint(0, &mut buf);
        assert!(Reader::new(&buf).read_tag().is_err());

        let mut buf = Vec::new();
        write_varint((1 << 3) | 3, &mut buf);
        assert!(Reader::new(&buf).read_tag().is_err());
    }

    #[test]
    fn test_read_bytes_past_end() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert!(reader.read_bytes(4).is_err());
        assert_eq!(reader.read_bytes(3).unwrap(), &[1, 2, 3]);
    }
}
