/// Decoder strictness switches. The default is lenient: corrupt payloads produce
/// diagnostics and partially decoded frames, only structural errors are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Verify the CRC-32 of every PNG chunk.
    pub verify_crc: bool,
    /// Treat a GIF frame whose LZW stream decodes to more or fewer pixels than the
    /// frame holds as an error.
    pub strict_lzw: bool,
    /// Treat a DEFLATE error in PNG image data as an error instead of using the
    /// bytes inflated so far.
    pub strict_inflate: bool,
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        DecodeOptions::default()
    }

    pub fn strict() -> Self {
        DecodeOptions {
            verify_crc: true,
            strict_lzw: true,
            strict_inflate: true,
        }
    }

    pub fn with_verify_crc(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }

    pub fn with_strict_lzw(mut self, strict_lzw: bool) -> Self {
        self.strict_lzw = strict_lzw;
        self
    }

    pub fn with_strict_inflate(mut self, strict_inflate: bool) -> Self {
        self.strict_inflate = strict_inflate;
        self
    }
}
