//! Unsigned LEB128 varints: 7 payload bits per byte, least significant group
//! first, high bit set on every byte except the last. A `u64` takes at most
//! [`MAX_VARINT_LEN`] bytes. Signed values are either stored as their
//! two's-complement `u64` (field files) or zigzag-encoded (wire protocol).

use ftgs_common::{Result, error::Error};

pub const MAX_VARINT_LEN: usize = 10;

#[inline]
pub fn write_u64(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

#[inline]
pub fn write_i64_zigzag(out: &mut Vec<u8>, value: i64) {
    write_u64(out, zigzag_encode(value));
}

#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes `write_u64` emits for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Forward-only varint cursor over a byte slice.
///
/// Decoding never reads past the end of the slice; a truncated or overlong
/// varint is reported as `InvalidFormat` naming the cursor's element.
#[derive(Clone, Debug)]
pub struct VarIntReader<'a> {
    buf: &'a [u8],
    pos: usize,
    element: &'static str,
}

impl<'a> VarIntReader<'a> {
    pub fn new(buf: &'a [u8], element: &'static str) -> VarIntReader<'a> {
        VarIntReader {
            buf,
            pos: 0,
            element,
        }
    }

    /// Creates a reader positioned at `pos`, failing if `pos` is beyond the buffer.
    pub fn at(buf: &'a [u8], pos: usize, element: &'static str) -> Result<VarIntReader<'a>> {
        if pos > buf.len() {
            return Err(Error::invalid_format(
                element,
                format!("offset {pos} beyond end of data ({} bytes)", buf.len()),
            ));
        }
        Ok(VarIntReader { buf, pos, element })
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.buf.get(self.pos + i) else {
                return Err(self.truncated());
            };
            let payload = (byte & 0x7f) as u64;
            if shift == 63 && payload > 1 {
                return Err(Error::invalid_format(self.element, "varint overflows u64"));
            }
            value |= payload << shift;
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(value);
            }
            shift += 7;
        }
        Err(Error::invalid_format(
            self.element,
            format!("varint longer than {MAX_VARINT_LEN} bytes at {}", self.pos),
        ))
    }

    /// Reads a varint holding the two's-complement bits of an `i64`.
    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_u64().map(|v| v as i64)
    }

    #[inline]
    pub fn read_i64_zigzag(&mut self) -> Result<i64> {
        self.read_u64().map(zigzag_decode)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.buf.get(self.pos).ok_or_else(|| self.truncated())?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.truncated());
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[cold]
    fn truncated(&self) -> Error {
        Error::invalid_format(
            self.element,
            format!("truncated data at offset {}", self.pos),
        )
    }
}
