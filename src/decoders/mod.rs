pub mod gif;
pub mod lzw;
pub mod png;
pub mod scanline;
