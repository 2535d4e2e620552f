use serde::Serialize;

use crate::utils::error::{AnimaError, AnimaResult};

/// Borrowed region of the source buffer, recorded during parsing and resolved later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(offset: usize, len: usize) -> Self {
        Span { offset, len }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns the bytes covered by this span. Spans are only created by a
    /// `ByteReader` over the same buffer, so an out-of-range span yields an empty slice.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.offset..self.end()).unwrap_or(&[])
    }
}

/// Sequential reader over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Returns the current offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns number of bytes left in the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn ensure(&self, n: usize) -> AnimaResult<()> {
        if self.remaining() < n {
            return Err(AnimaError::UnexpectedEof {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }

        Ok(())
    }

    /// Reads a single byte.
    ///
    /// # Returns
    /// - The byte read
    /// - `AnimaError::UnexpectedEof` if the buffer is exhausted
    pub fn read_u8(&mut self) -> AnimaResult<u8> {
        self.ensure(1)?;
        let byte = self.data[self.pos];
        self.pos += 1;

        Ok(byte)
    }

    /// Reads a little-endian 16-bit value (GIF byte order).
    pub fn read_u16_le(&mut self) -> AnimaResult<u16> {
        let bytes = self.read_array::<2>()?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Reads a big-endian 16-bit value (PNG byte order).
    pub fn read_u16_be(&mut self) -> AnimaResult<u16> {
        let bytes = self.read_array::<2>()?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Reads a big-endian 32-bit value (PNG byte order).
    pub fn read_u32_be(&mut self) -> AnimaResult<u32> {
        let bytes = self.read_array::<4>()?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads a fixed number of bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> AnimaResult<[u8; N]> {
        self.ensure(N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;

        Ok(bytes)
    }

    /// Borrows the next `n` bytes without copying and advances past them.
    ///
    /// # Parameters
    /// - `n`: The number of bytes to read
    ///
    /// # Returns
    /// - A slice of the source buffer
    /// - `AnimaError::UnexpectedEof` if fewer than `n` bytes are left
    pub fn read_slice(&mut self, n: usize) -> AnimaResult<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;

        Ok(slice)
    }

    /// Records a span of the next `n` bytes and advances past them.
    pub fn read_span(&mut self, n: usize) -> AnimaResult<Span> {
        self.ensure(n)?;
        let span = Span::new(self.pos, n);
        self.pos += n;

        Ok(span)
    }

    pub fn skip(&mut self, n: usize) -> AnimaResult<()> {
        self.ensure(n)?;
        self.pos += n;

        Ok(())
    }

    /// Peeks at the next `n` bytes without consuming them.
    /// Returns `None` if fewer than `n` bytes are left.
    pub fn peek_slice(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos + n)
    }

    /// Skips a chain of length-prefixed sub-blocks up to and including the
    /// zero-length terminator.
    ///
    /// # Returns
    /// - The span covering every sub-block including length bytes and terminator
    /// - `AnimaError::UnexpectedEof` if a sub-block runs past the end of the buffer
    pub fn skip_sub_blocks(&mut self) -> AnimaResult<Span> {
        let start = self.pos;

        loop {
            let block_size = self.read_u8()? as usize;
            if block_size == 0 {
                break;
            }

            self.skip(block_size)?;
        }

        Ok(Span::new(start, self.pos - start))
    }
}
