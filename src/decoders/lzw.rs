//! Variable-width LZW decompression for GIF image data.
//!
//! The string table stores every code as a `(prefix, suffix)` pair. A code's
//! string is produced by chasing the prefix chain twice: once to measure it, once
//! to write it backwards from its last byte. No per-entry length or string copy
//! is kept.

use std::ops::Range;

use crate::log_warn;

pub const MAX_CODE_BITS: u8 = 12;
pub const TABLE_SIZE: usize = 1 << MAX_CODE_BITS;

const NO_PREFIX: u16 = u16::MAX;

/// How the compressed stream related to the size of the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzwStatus {
    /// Exactly `out.len()` indices were produced.
    Complete,
    /// The stream ended (EOI, terminator or corruption) after `written` indices.
    Short { written: usize },
    /// The stream held more data than fits; decoding stopped at `out.len()`.
    Overflow,
}

impl LzwStatus {
    /// Number of indices written into the output buffer.
    pub fn written(&self, capacity: usize) -> usize {
        match self {
            LzwStatus::Complete | LzwStatus::Overflow => capacity,
            LzwStatus::Short { written } => *written,
        }
    }
}

/// Result of writing one code's string into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Output range that was actually written.
    pub range: Range<usize>,
    /// First byte of the string, whether or not it fit.
    pub first: u8,
    /// False when the string was cut off by the end of the output.
    pub complete: bool,
}

/// Pulls LSB-first codes out of GIF sub-blocks, crossing block boundaries.
struct CodeReader<'a> {
    data: &'a [u8],
    pos: usize,
    block_left: usize,
    finished: bool,
    acc: u32,
    bits: u8,
}

impl<'a> CodeReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        CodeReader {
            data,
            pos: 0,
            block_left: 0,
            finished: false,
            acc: 0,
            bits: 0,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        while self.block_left == 0 {
            if self.finished {
                return None;
            }

            let Some(&size) = self.data.get(self.pos) else {
                self.finished = true;
                return None;
            };

            self.pos += 1;

            if size == 0 {
                self.finished = true;
                return None;
            }

            self.block_left = size as usize;
        }

        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        self.block_left -= 1;

        Some(byte)
    }

    fn read_code(&mut self, width: u8) -> Option<u16> {
        while self.bits < width {
            let byte = self.next_byte()?;
            self.acc |= (byte as u32) << self.bits;
            self.bits += 8;
        }

        let code = (self.acc & ((1 << width) - 1)) as u16;
        self.acc >>= width;
        self.bits -= width;

        Some(code)
    }
}

/// Fixed-capacity LZW string table.
pub struct LzwTable {
    prefix: Box<[u16; TABLE_SIZE]>,
    suffix: Box<[u8; TABLE_SIZE]>,
}

impl Default for LzwTable {
    fn default() -> Self {
        LzwTable::new()
    }
}

impl LzwTable {
    pub fn new() -> Self {
        LzwTable {
            prefix: Box::new([NO_PREFIX; TABLE_SIZE]),
            suffix: Box::new([0; TABLE_SIZE]),
        }
    }

    /// Installs the single-byte root entries for `clear_code` literals.
    fn init_roots(&mut self, clear_code: u16) {
        for code in 0..clear_code as usize {
            self.prefix[code] = NO_PREFIX;
            self.suffix[code] = code as u8;
        }
    }

    fn insert(&mut self, code: u16, prefix: u16, suffix: u8) {
        self.prefix[code as usize] = prefix;
        self.suffix[code as usize] = suffix;
    }

    /// Walks the prefix chain of `code`, returning its length and first byte.
    fn measure(&self, code: u16) -> (usize, u8) {
        let mut len = 1;
        let mut current = code;

        while self.prefix[current as usize] != NO_PREFIX {
            current = self.prefix[current as usize];
            len += 1;
        }

        (len, self.suffix[current as usize])
    }

    /// Writes the string for `code` into `out` starting at `at`.
    ///
    /// The chain is measured first, then walked a second time filling `out`
    /// backwards from the string's end. Bytes that would land past the end of
    /// `out` are dropped.
    ///
    /// `code` must be a valid entry: a root, or a code assigned since the last clear.
    pub fn resolve_code(&self, code: u16, out: &mut [u8], at: usize) -> Resolved {
        let (len, first) = self.measure(code);
        let end = at + len;
        let limit = out.len().min(end);

        let mut pos = end;
        let mut current = code;

        loop {
            pos -= 1;

            if pos < limit {
                out[pos] = self.suffix[current as usize];
            }

            let prefix = self.prefix[current as usize];
            if prefix == NO_PREFIX {
                break;
            }

            current = prefix;
        }

        Resolved {
            range: at.min(limit)..limit,
            first,
            complete: end <= out.len(),
        }
    }
}

/// Reusable decompressor, owns the string table so consecutive frames do not
/// reallocate it.
#[derive(Default)]
pub struct LzwDecoder {
    table: LzwTable,
}

impl LzwDecoder {
    pub fn new() -> Self {
        LzwDecoder { table: LzwTable::new() }
    }

    /// Decompresses GIF image data into `out`.
    ///
    /// # Parameters
    /// - `min_code_size`: LZW minimum code size from the image descriptor (1..=11)
    /// - `sub_blocks`: raw length-prefixed sub-blocks, optionally ending in the
    ///   zero-length terminator
    /// - `out`: destination for palette indices, sized to the frame's pixel count
    ///
    /// # Returns
    /// - How the stream length compared to `out.len()`. Indices past the written
    ///   count are left as they were.
    pub fn decompress(&mut self, min_code_size: u8, sub_blocks: &[u8], out: &mut [u8]) -> LzwStatus {
        if min_code_size == 0 || min_code_size >= MAX_CODE_BITS {
            log_warn!("Invalid LZW minimum code size: {}", min_code_size);
            return LzwStatus::Short { written: 0 };
        }

        let clear_code: u16 = 1 << min_code_size;
        let end_code = clear_code + 1;

        self.table.init_roots(clear_code);

        let mut reader = CodeReader::new(sub_blocks);
        let mut code_size = min_code_size + 1;
        let mut next_code = end_code + 1;
        let mut prev_code: Option<u16> = None;
        let mut written = 0;

        while let Some(code) = reader.read_code(code_size) {
            if code == clear_code {
                code_size = min_code_size + 1;
                next_code = end_code + 1;
                prev_code = None;
                continue;
            }

            if code == end_code {
                break;
            }

            let Some(prev) = prev_code else {
                if code > end_code {
                    log_warn!("LZW stream starts with non-literal code {}", code);
                    break;
                }

                if written >= out.len() {
                    log_warn!("LZW data exceeds frame size of {} pixels", out.len());
                    return LzwStatus::Overflow;
                }

                out[written] = code as u8;
                written += 1;
                prev_code = Some(code);

                // With a minimum code size of 1 the first free code already needs 3 bits.
                if next_code >= (1 << code_size) && code_size < MAX_CODE_BITS {
                    code_size += 1;
                }

                continue;
            };

            let resolved = if code < next_code {
                self.table.resolve_code(code, out, written)
            } else if code == next_code {
                // Code not in the table yet: previous string plus its own first byte.
                let mut resolved = self.table.resolve_code(prev, out, written);

                if resolved.complete {
                    let at = resolved.range.end;
                    if at < out.len() {
                        out[at] = resolved.first;
                        resolved.range.end += 1;
                    } else {
                        resolved.complete = false;
                    }
                }

                resolved
            } else {
                log_warn!("Invalid LZW code {} (next code {})", code, next_code);
                break;
            };

            written = resolved.range.end;

            if !resolved.complete {
                log_warn!("LZW data exceeds frame size of {} pixels", out.len());
                return LzwStatus::Overflow;
            }

            if (next_code as usize) < TABLE_SIZE {
                self.table.insert(next_code, prev, resolved.first);
                next_code += 1;

                if next_code >= (1 << code_size) && code_size < MAX_CODE_BITS {
                    code_size += 1;
                }
            }

            prev_code = Some(code);
        }

        if written == out.len() {
            LzwStatus::Complete
        } else {
            log_warn!("LZW data ended after {} of {} pixels", written, out.len());
            LzwStatus::Short { written }
        }
    }
}

/// Convenience wrapper around [`LzwDecoder::decompress`] with a fresh table.
pub fn decompress(min_code_size: u8, sub_blocks: &[u8], out: &mut [u8]) -> LzwStatus {
    LzwDecoder::new().decompress(min_code_size, sub_blocks, out)
}
