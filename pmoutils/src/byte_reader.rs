//! Bounds-checked cursor over an immutable byte slice.
//!
//! Every read either returns the requested bytes or fails with
//! [`ByteReaderError`]; nothing ever reads past the end of the buffer.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ByteReaderError {
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("offset {offset} is outside of a {len} bytes buffer")]
    OffsetOutOfRange { offset: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reader positioned at `offset`, used to re-read a region of the buffer.
    pub fn at(buf: &'a [u8], offset: usize) -> Result<Self, ByteReaderError> {
        let mut reader = Self::new(buf);
        reader.seek(offset)?;
        Ok(reader)
    }

    /// The whole underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), ByteReaderError> {
        if offset > self.buf.len() {
            return Err(ByteReaderError::OffsetOutOfRange {
                offset,
                len: self.buf.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, ByteReaderError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(ByteReaderError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
                available: 0,
            })
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ByteReaderError> {
        if n > self.remaining() {
            return Err(ByteReaderError::UnexpectedEof {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..self.pos])
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ByteReaderError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, ByteReaderError> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, ByteReaderError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, ByteReaderError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a `{1-byte length}{length bytes}` chunk.
    pub fn read_length_prefixed(&mut self) -> Result<&'a [u8], ByteReaderError> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let start = self.pos;
        self.pos = self.buf.len();
        &self.buf[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_integers() {
        let data = [0x1F, 0x90, 0x00, 0x00, 0x01, 0x00, 0xAA];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_u16_be().unwrap(), 8080);
        assert_eq!(reader.read_u32_be().unwrap(), 256);
        assert_eq!(reader.read_u8().unwrap(), 0xAA);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_past_end_fails() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = ByteReader::new(&data);
        reader.skip(2).unwrap();

        let err = reader.read_u16_be().unwrap_err();
        assert_eq!(
            err,
            ByteReaderError::UnexpectedEof {
                offset: 2,
                needed: 2,
                available: 1
            }
        );
        // La position n'a pas bougé après l'échec
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_length_prefixed_chunk() {
        let data = b"\x03a=1\x0atruncated";
        let mut reader = ByteReader::new(data);

        assert_eq!(reader.read_length_prefixed().unwrap(), b"a=1");
        assert!(reader.read_length_prefixed().is_err());
    }

    #[test]
    fn test_seek_out_of_range() {
        let data = [0u8; 4];
        assert!(ByteReader::at(&data, 4).is_ok());
        assert_eq!(
            ByteReader::at(&data, 5).unwrap_err(),
            ByteReaderError::OffsetOutOfRange { offset: 5, len: 4 }
        );
    }
}
