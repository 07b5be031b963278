//! Binary encoder and decoder.
//!
//! Integers are written as LEB128 varints; signed values are zigzag-encoded
//! first so small negative numbers stay short. Doubles are 8 little-endian
//! bytes, strings a varint byte length followed by UTF-8.

use std::io::{self, Read, Write};

use crate::error::{CodecError, CodecResult};

/// Strings are read in pieces of this size so a corrupt length fails on the
/// missing bytes instead of allocating them up front.
const STRING_READ_PIECE: usize = 8 * 1024;

pub trait Encoder {
    fn write_byte(&mut self, value: u8) -> CodecResult<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()>;

    fn write_boolean(&mut self, value: bool) -> CodecResult<()> {
        self.write_byte(value as u8)
    }

    /// Unsigned varint, for lengths, ids and tags.
    fn write_small_int(&mut self, value: u32) -> CodecResult<()> {
        self.write_var_u64(value as u64)
    }

    fn write_int(&mut self, value: i32) -> CodecResult<()> {
        self.write_var_u64(((value << 1) ^ (value >> 31)) as u32 as u64)
    }

    fn write_long(&mut self, value: i64) -> CodecResult<()> {
        self.write_var_u64(((value << 1) ^ (value >> 63)) as u64)
    }

    fn write_double(&mut self, value: f64) -> CodecResult<()> {
        self.write_bytes(&value.to_bits().to_le_bytes())
    }

    fn write_string(&mut self, value: &str) -> CodecResult<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| CodecError::Unsupported(format!("string of {} bytes is too long", value.len())))?;
        self.write_small_int(len)?;
        self.write_bytes(value.as_bytes())
    }

    fn write_var_u64(&mut self, mut value: u64) -> CodecResult<()> {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                return self.write_byte(byte);
            }
            self.write_byte(byte | 0x80)?;
        }
    }
}

pub trait Decoder {
    fn read_byte(&mut self) -> CodecResult<u8>;

    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> CodecResult<()>;

    fn read_boolean(&mut self) -> CodecResult<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::UnexpectedTag {
                tag: other,
                context: "boolean",
            }),
        }
    }

    fn read_small_int(&mut self) -> CodecResult<u32> {
        let value = self.read_var_u64()?;
        u32::try_from(value).map_err(|_| CodecError::Format(format!("varint {value} exceeds 32 bits")))
    }

    fn read_int(&mut self) -> CodecResult<i32> {
        let raw = self.read_small_int()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    fn read_long(&mut self) -> CodecResult<i64> {
        let raw = self.read_var_u64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    fn read_double(&mut self) -> CodecResult<f64> {
        let mut bytes = [0u8; 8];
        self.read_exact_bytes(&mut bytes)?;
        Ok(f64::from_bits(u64::from_le_bytes(bytes)))
    }

    fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_small_int()? as usize;
        let mut bytes = Vec::with_capacity(len.min(STRING_READ_PIECE));
        let mut piece = [0u8; STRING_READ_PIECE];
        while bytes.len() < len {
            let n = (len - bytes.len()).min(STRING_READ_PIECE);
            self.read_exact_bytes(&mut piece[..n])?;
            bytes.extend_from_slice(&piece[..n]);
        }
        String::from_utf8(bytes).map_err(|e| CodecError::Format(format!("invalid UTF-8 in string: {e}")))
    }

    fn read_var_u64(&mut self) -> CodecResult<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::Format("varint is longer than 10 bytes".to_string()))
    }
}

/// [`Encoder`] over any byte sink.
#[derive(Debug)]
pub struct BinaryEncoder<W: Write> {
    out: W,
}

impl<W: Write> BinaryEncoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Encoder for BinaryEncoder<W> {
    fn write_byte(&mut self, value: u8) -> CodecResult<()> {
        self.out.write_all(&[value])?;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.out.write_all(bytes)?;
        Ok(())
    }
}

/// [`Decoder`] over any byte source. Running out of input is an
/// `UnexpectedEof` I/O error.
#[derive(Debug)]
pub struct BinaryDecoder<R: Read> {
    input: R,
}

impl<R: Read> BinaryDecoder<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Whether the source is exhausted. Consumes one byte when it is not, so
    /// only call this once decoding is finished.
    pub fn at_end(&mut self) -> CodecResult<bool> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read> Decoder for BinaryDecoder<R> {
    fn read_byte(&mut self) -> CodecResult<u8> {
        let mut byte = [0u8; 1];
        self.input.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        self.input.read_exact(buf)?;
        Ok(())
    }
}
