use serde::Serialize;

use crate::decoders::gif::GifFrameDescriptor;
use crate::decoders::png::{ActlChunk, AncillaryChunks, FrameControl, PngImageHeader};
use crate::decoders::scanline::TransparencyData;

#[derive(Debug, Clone, Serialize)]
pub enum ImageInfo {
    Gif(GifInfo),
    Png(PngInfo),
}

#[derive(Debug, Clone, Serialize)]
pub struct GifInfo {
    pub version: String,
    pub width: u32,
    pub height: u32,
    /// Number of RGB entries in the global color table.
    pub global_palette_size: usize,
    pub color_resolution: u8,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
    pub loop_count: Option<u16>,
    pub comments: Vec<String>,
    pub app_extensions: Vec<String>,
    pub frames: Vec<GifFrameDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PngInfo {
    pub header: Option<PngImageHeader>,
    pub palette_size: usize,
    pub transparency: Option<TransparencyData>,
    pub ancillary: AncillaryChunks,
    pub actl_info: Option<ActlChunk>,
    pub frames: Vec<FrameControl>,
}
