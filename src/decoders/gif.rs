use serde::Serialize;

use crate::decoders::lzw::{LzwDecoder, LzwStatus};
use crate::utils::bytereader::{ByteReader, Span};
use crate::utils::compose::{Compositor, DisposalMethod, Rect};
use crate::utils::error::{AnimaError, AnimaResult};
use crate::utils::info::GifInfo;
use crate::utils::options::DecodeOptions;
use crate::utils::text::decode_text;
use crate::{log_debug, log_warn, Frame, RasterAnimation};

/// `0B "NETSCAPE2.0" 03 01`, followed by the loop count and a zero terminator.
const NETSCAPE_LOOP_HEADER: [u8; 14] = [
    0x0B, b'N', b'E', b'T', b'S', b'C', b'A', b'P', b'E', b'2', b'.', b'0', 0x03, 0x01,
];

/// Start row and row stride of the four GIF interlace passes.
const INTERLACE_PASSES: [(u32, u32); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// One image block of a GIF, as recorded by the parser. Pixel data stays in the
/// source buffer until the frame is composited.
#[derive(Debug, Clone, Serialize)]
pub struct GifFrameDescriptor {
    pub rect: Rect,
    pub local_palette: Option<Span>,
    pub interlaced: bool,
    pub lzw_minimum_code_size: u8,
    /// Length-prefixed LZW sub-blocks including the terminator.
    pub data: Span,
    pub transparent_index: Option<u8>,
    pub disposal: DisposalMethod,
    /// Hundredths of a second.
    pub delay: u16,
}

/// Graphics control values in effect for the next image block. They carry over
/// from one image to the next until another control extension replaces them.
#[derive(Debug, Clone, Copy)]
struct GraphicsControl {
    delay: u16,
    transparent_index: Option<u8>,
    disposal: DisposalMethod,
}

impl Default for GraphicsControl {
    fn default() -> Self {
        GraphicsControl {
            delay: 0,
            transparent_index: None,
            disposal: DisposalMethod::None,
        }
    }
}

/// Yields the canvas row of each stored row of an interlaced image, in storage order.
#[derive(Debug, Clone)]
pub struct InterlacedRows {
    height: u32,
    pass: usize,
    row: u32,
}

impl InterlacedRows {
    pub fn new(height: u32) -> Self {
        InterlacedRows { height, pass: 0, row: 0 }
    }
}

impl Iterator for InterlacedRows {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.pass < INTERLACE_PASSES.len() {
            let (_, stride) = INTERLACE_PASSES[self.pass];

            if self.row < self.height {
                let row = self.row;
                self.row += stride;
                return Some(row);
            }

            self.pass += 1;
            if let Some(&(start, _)) = INTERLACE_PASSES.get(self.pass) {
                self.row = start;
            }
        }

        None
    }
}

/// Draws decoded palette indices onto the canvas at the frame's position.
///
/// Indices equal to the transparent index, or outside the palette, leave the
/// canvas untouched. `indices` may be shorter than the frame; missing rows are
/// not drawn.
pub fn blit_frame(canvas: &mut Compositor, frame: &GifFrameDescriptor, indices: &[u8], palette: &[u8]) {
    let rect = frame.rect;
    let frame_width = rect.width as usize;

    if frame_width == 0 {
        return;
    }

    let rows: Box<dyn Iterator<Item = u32>> = if frame.interlaced {
        Box::new(InterlacedRows::new(rect.height))
    } else {
        Box::new(0..rect.height)
    };

    for (src_row, row) in indices.chunks(frame_width).zip(rows) {
        let y = rect.y + row;
        if y >= canvas.height() {
            continue;
        }

        for (x_in_frame, &index) in src_row.iter().enumerate() {
            let x = rect.x + x_in_frame as u32;
            if x >= canvas.width() {
                break;
            }

            if frame.transparent_index == Some(index) {
                continue;
            }

            let color_start = index as usize * 3;
            let Some(color) = palette.get(color_start..color_start + 3) else {
                continue;
            };

            let offset = canvas.offset(x, y);
            let pixel = &mut canvas.canvas_mut()[offset..offset + 4];
            pixel[..3].copy_from_slice(color);
            pixel[3] = 255;
        }
    }
}

pub struct GifDecoder<'a> {
    data: &'a [u8],
    options: DecodeOptions,
    parsed: bool,
    version: String,
    screen_width: u32,
    screen_height: u32,
    global_palette: Option<Span>,
    color_resolution: u8,
    background_color_index: u8,
    pixel_aspect_ratio: u8,
    loop_count: Option<u16>,
    comments: Vec<String>,
    app_extensions: Vec<String>,
    frames: Vec<GifFrameDescriptor>,
}

impl<'a> GifDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            options: DecodeOptions::default(),
            parsed: false,
            version: String::new(),
            screen_width: 0,
            screen_height: 0,
            global_palette: None,
            color_resolution: 0,
            background_color_index: 0,
            pixel_aspect_ratio: 0,
            loop_count: None,
            comments: Vec::new(),
            app_extensions: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn width(&self) -> u32 {
        self.screen_width
    }

    pub fn height(&self) -> u32 {
        self.screen_height
    }

    pub fn frames(&self) -> &[GifFrameDescriptor] {
        &self.frames
    }

    pub fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }

    pub fn get_info(&self) -> GifInfo {
        GifInfo {
            version: self.version.clone(),
            width: self.screen_width,
            height: self.screen_height,
            global_palette_size: self.global_palette.map(|span| span.len / 3).unwrap_or(0),
            color_resolution: self.color_resolution,
            background_color_index: self.background_color_index,
            pixel_aspect_ratio: self.pixel_aspect_ratio,
            loop_count: self.loop_count,
            comments: self.comments.clone(),
            app_extensions: self.app_extensions.clone(),
            frames: self.frames.clone(),
        }
    }

    /// Walks every block of the file, recording frame descriptors.
    pub fn parse(&mut self) -> AnimaResult<()> {
        if self.parsed {
            return Ok(());
        }

        let mut reader = ByteReader::new(self.data);

        self.read_header(&mut reader)?;
        self.read_blocks(&mut reader)?;
        self.parsed = true;

        Ok(())
    }

    fn read_header(&mut self, reader: &mut ByteReader<'a>) -> AnimaResult<()> {
        let signature = reader.read_array::<6>()?;

        if &signature[0..4] != b"GIF8" || (signature[4].wrapping_add(1) & 0xFD) != 0x38 || signature[5] != b'a' {
            return Err(AnimaError::format(0, "GIF87a or GIF89a signature"));
        }

        self.version = decode_text(&signature[3..6]);

        self.screen_width = reader.read_u16_le()? as u32;
        self.screen_height = reader.read_u16_le()? as u32;

        let packed_fields = reader.read_u8()?;
        let global_color_table_flag = (packed_fields & 0b10000000) != 0;
        self.color_resolution = (packed_fields & 0b01110000) >> 4;
        let size_of_global_color_table = packed_fields & 0b00000111;

        self.background_color_index = reader.read_u8()?;
        self.pixel_aspect_ratio = reader.read_u8()?;

        if global_color_table_flag {
            let num_entries = 1usize << (size_of_global_color_table + 1);
            self.global_palette = Some(reader.read_span(num_entries * 3)?);
        }

        Ok(())
    }

    fn read_blocks(&mut self, reader: &mut ByteReader<'a>) -> AnimaResult<()> {
        let mut control = GraphicsControl::default();

        loop {
            if reader.is_eof() {
                log_warn!("GIF trailer missing, stopping at end of data");
                break;
            }

            let offset = reader.position();
            let block_type = reader.read_u8()?;

            match block_type {
                // Image Separator
                0x2C => {
                    self.read_frame(reader, &control)?;
                }
                // Extension Introducer
                0x21 => {
                    let label_offset = reader.position();
                    let label = reader.read_u8()?;

                    match label {
                        0xFF => self.read_application_extension(reader)?,
                        0xF9 => control = self.read_graphics_control_extension(reader)?,
                        0xFE => self.read_comment_extension(reader)?,
                        0x01 => {
                            log_debug!("Skipping plain text extension");
                            reader.skip_sub_blocks()?;
                        }
                        _ => {
                            return Err(AnimaError::format(
                                label_offset,
                                format!("extension label 0xFF, 0xF9, 0xFE or 0x01, found {:#04x}", label),
                            ));
                        }
                    }
                }
                // Trailer
                0x3B => break,
                _ => {
                    return Err(AnimaError::format(
                        offset,
                        format!("block introducer 0x21, 0x2C or 0x3B, found {:#04x}", block_type),
                    ));
                }
            }
        }

        Ok(())
    }

    fn read_application_extension(&mut self, reader: &mut ByteReader<'a>) -> AnimaResult<()> {
        if let Some(header) = reader.peek_slice(NETSCAPE_LOOP_HEADER.len() + 3) {
            if header[..NETSCAPE_LOOP_HEADER.len()] == NETSCAPE_LOOP_HEADER && header[16] == 0 {
                let count = u16::from_le_bytes([header[14], header[15]]);
                reader.skip(header.len())?;

                self.loop_count = Some(count);
                self.app_extensions.push("NETSCAPE2.0".to_string());

                return Ok(());
            }
        }

        if let Some(identifier) = reader.peek_slice(12).filter(|block| block[0] == 11) {
            self.app_extensions.push(decode_text(&identifier[1..]));
        }

        reader.skip_sub_blocks()?;

        Ok(())
    }

    fn read_graphics_control_extension(&mut self, reader: &mut ByteReader<'a>) -> AnimaResult<GraphicsControl> {
        let size_offset = reader.position();
        let block_size = reader.read_u8()?;

        if block_size != 4 {
            return Err(AnimaError::format(
                size_offset,
                format!("graphics control block size 4, found {}", block_size),
            ));
        }

        let packed = reader.read_u8()?;
        let delay = reader.read_u16_le()?;
        let transparent_color_index = reader.read_u8()?;

        // Block terminator, plus anything a sloppy encoder put before it
        reader.skip_sub_blocks()?;

        let disposal = match (packed >> 2) & 0x07 {
            2 => DisposalMethod::Background,
            3 => DisposalMethod::Previous,
            _ => DisposalMethod::None,
        };

        let transparent_index = if packed & 0x01 != 0 {
            Some(transparent_color_index)
        } else {
            None
        };

        Ok(GraphicsControl {
            delay,
            transparent_index,
            disposal,
        })
    }

    fn read_comment_extension(&mut self, reader: &mut ByteReader<'a>) -> AnimaResult<()> {
        let mut comment = Vec::new();

        loop {
            let block_size = reader.read_u8()? as usize;
            if block_size == 0 {
                break;
            }

            comment.extend_from_slice(reader.read_slice(block_size)?);
        }

        self.comments.push(decode_text(&comment));

        Ok(())
    }

    fn read_frame(&mut self, reader: &mut ByteReader<'a>, control: &GraphicsControl) -> AnimaResult<()> {
        let left = reader.read_u16_le()? as u32;
        let top = reader.read_u16_le()? as u32;
        let width = reader.read_u16_le()? as u32;
        let height = reader.read_u16_le()? as u32;

        let packed_fields = reader.read_u8()?;
        let local_color_table_flag = (packed_fields & 0b10000000) != 0;
        let interlaced = (packed_fields & 0b01000000) != 0;
        let size_of_local_color_table = packed_fields & 0b00000111;

        let local_palette = if local_color_table_flag {
            let table_size = 3 * (1usize << (size_of_local_color_table + 1));
            Some(reader.read_span(table_size)?)
        } else {
            None
        };

        let code_size_offset = reader.position();
        let lzw_minimum_code_size = reader.read_u8()?;

        if !(1..=11).contains(&lzw_minimum_code_size) {
            return Err(AnimaError::format(
                code_size_offset,
                format!("LZW minimum code size between 1 and 11, found {}", lzw_minimum_code_size),
            ));
        }

        let data_start = reader.position();
        let data = match reader.skip_sub_blocks() {
            Ok(span) => span,
            Err(AnimaError::UnexpectedEof { .. }) if !self.options.strict_lzw => {
                log_warn!("Image data of frame {} is truncated", self.frames.len());
                reader.skip(reader.remaining())?;
                Span::new(data_start, reader.position() - data_start)
            }
            Err(e) => return Err(e),
        };

        self.frames.push(GifFrameDescriptor {
            rect: Rect::new(left, top, width, height),
            local_palette,
            interlaced,
            lzw_minimum_code_size,
            data,
            transparent_index: control.transparent_index,
            disposal: control.disposal,
            delay: control.delay,
        });

        Ok(())
    }

    /// Canvas size: the logical screen, or the union of all frames when the
    /// screen descriptor is empty.
    fn canvas_size(&self) -> AnimaResult<(u32, u32)> {
        if self.screen_width > 0 && self.screen_height > 0 {
            return Ok((self.screen_width, self.screen_height));
        }

        let width = self.frames.iter().map(|frame| frame.rect.right()).max().unwrap_or(0);
        let height = self.frames.iter().map(|frame| frame.rect.bottom()).max().unwrap_or(0);

        if width == 0 || height == 0 {
            return Err(AnimaError::InvalidDimensions { width, height });
        }

        log_warn!("Empty logical screen, using frame extents {}x{}", width, height);

        Ok((width, height))
    }

    pub fn decode(&mut self) -> AnimaResult<RasterAnimation> {
        self.parse()?;

        if self.frames.is_empty() {
            return Err(AnimaError::Custom("No frames found".into()));
        }

        let (width, height) = self.canvas_size()?;
        let mut compositor = Compositor::new(width, height);
        let mut lzw = LzwDecoder::new();

        for (index, frame) in self.frames.iter().enumerate() {
            let pixel_count = frame.rect.width as usize * frame.rect.height as usize;
            let mut indices = vec![0u8; pixel_count];

            let status = lzw.decompress(frame.lzw_minimum_code_size, frame.data.slice(self.data), &mut indices);

            if self.options.strict_lzw && status != LzwStatus::Complete {
                return Err(AnimaError::DataLength {
                    frame: index,
                    expected: pixel_count,
                    actual: match status {
                        LzwStatus::Short { written } => Some(written),
                        _ => None,
                    },
                });
            }

            let written = status.written(pixel_count);

            let palette = frame
                .local_palette
                .or(self.global_palette)
                .map(|span| span.slice(self.data))
                .unwrap_or(&[]);

            if palette.is_empty() {
                log_warn!("Frame {} has no color table, nothing will be drawn", index);
            }

            let indices = &indices[..written];
            compositor.compose(frame.rect, frame.disposal, frame.delay as u32 * 10, |canvas| {
                blit_frame(canvas, frame, indices, palette)
            });
        }

        let frames: Vec<Frame> = compositor.into_frames();

        Ok(RasterAnimation::new(width, height, frames, self.loop_count.map(u32::from)))
    }
}
