use serde::Serialize;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::decoders::scanline::{inflate, reconstruct, ColorContext, ColorType, PixelLayout, TransparencyData};
use crate::utils::bytereader::ByteReader;
use crate::utils::compose::{BlendOp, Compositor, DisposalMethod, Rect};
use crate::utils::error::{AnimaError, AnimaResult};
use crate::utils::info::PngInfo;
use crate::utils::options::DecodeOptions;
use crate::utils::text::decode_text;
use crate::{log_debug, log_warn, Frame, RasterAnimation};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PngChunk {
    // Critical chunks
    IHDR, // Image header
    PLTE, // Palette
    IDAT, // Image data
    IEND, // End of image

    // Ancillary chunks
    TRNS, // Transparency
    CHRM, // Chromaticity
    GAMA, // Gamma
    SRGB, // Standard RGB
    TEXT, // Text
    ZTXT, // Compressed text
    ITXT, // International text
    BKGD, // Background color
    PHYS, // Physical dimensions
    HIST, // Palette histogram

    // Animation chunks
    ACTL, // Animation control
    FCTL, // Frame control
    FDAT, // Frame data
}

fn get_chunk(chunk_type: &[u8; 4]) -> Option<PngChunk> {
    match chunk_type {
        b"IHDR" => Some(PngChunk::IHDR),
        b"PLTE" => Some(PngChunk::PLTE),
        b"IDAT" => Some(PngChunk::IDAT),
        b"IEND" => Some(PngChunk::IEND),
        b"tRNS" => Some(PngChunk::TRNS),
        b"cHRM" => Some(PngChunk::CHRM),
        b"gAMA" => Some(PngChunk::GAMA),
        b"sRGB" => Some(PngChunk::SRGB),
        b"tEXt" => Some(PngChunk::TEXT),
        b"zTXt" => Some(PngChunk::ZTXT),
        b"iTXt" => Some(PngChunk::ITXT),
        b"bKGD" => Some(PngChunk::BKGD),
        b"pHYs" => Some(PngChunk::PHYS),
        b"hIST" => Some(PngChunk::HIST),
        b"acTL" => Some(PngChunk::ACTL),
        b"fcTL" => Some(PngChunk::FCTL),
        b"fdAT" => Some(PngChunk::FDAT),
        _ => None,
    }
}

/// Payload of one chunk together with where it sits in the file.
struct Chunk<'a> {
    kind: PngChunk,
    offset: usize,
    data: &'a [u8],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PngImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub interlaced: bool,
    #[serde(skip)]
    pub layout: PixelLayout,
}

#[derive(Debug, Clone, Serialize)]
pub enum BackgroundData {
    Grayscale(u16),
    RGB(u16, u16, u16),
    PaletteIndex(u8),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum RenderingIntent {
    Perceptual = 0,
    RelativeColorimetric = 1,
    Saturation = 2,
    AbsoluteColorimetric = 3,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Chromaticities {
    pub white_point_x: f32,
    pub white_point_y: f32,
    pub red_x: f32,
    pub red_y: f32,
    pub green_x: f32,
    pub green_y: f32,
    pub blue_x: f32,
    pub blue_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PhysicalUnit {
    Unknown,
    Meter,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhysicalDimensions {
    pub pixels_per_unit_x: u32,
    pub pixels_per_unit_y: u32,
    pub unit: PhysicalUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PngText {
    Basic {
        keyword: String,
        text: String,
    },
    Compressed {
        keyword: String,
        text: String,
    },
    International {
        keyword: String,
        language_tag: String,
        translated_keyword: String,
        text: String,
    },
}

/// Informational chunks. None of them affect decoded pixels.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AncillaryChunks {
    pub gamma: Option<f32>,
    pub rendering_intent: Option<RenderingIntent>,
    pub chromaticities: Option<Chromaticities>,
    pub background: Option<BackgroundData>,
    pub physical_dimensions: Option<PhysicalDimensions>,
    pub histogram: Option<Vec<u16>>,
    pub text_chunks: Vec<PngText>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActlChunk {
    pub num_frames: u32,
    pub num_plays: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameControl {
    pub sequence_number: u32,
    pub rect: Rect,
    pub delay_num: u16,
    pub delay_den: u16,
    pub dispose: DisposalMethod,
    pub blend: BlendOp,
}

impl FrameControl {
    /// Frame delay in milliseconds, rounded. A zero denominator means 1/100 s units.
    pub fn delay_ms(&self) -> u32 {
        let den = if self.delay_den == 0 { 100 } else { self.delay_den as u32 };

        (self.delay_num as u32 * 1000 + den / 2) / den
    }
}

#[derive(Debug, Clone)]
struct PngFrame {
    control: FrameControl,
    /// Frame 0 may be the default image, in which case its data is the IDAT stream.
    uses_default_image: bool,
    data: Vec<u8>,
}

struct CrcCalculator {
    table: [u32; 256],
}

impl CrcCalculator {
    fn new() -> Self {
        let mut table = [0u32; 256];
        for (n, entry) in table.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                if c & 1 == 1 {
                    c = 0xedb88320u32 ^ (c >> 1);
                } else {
                    c >>= 1;
                }
            }
            *entry = c;
        }
        Self { table }
    }

    fn update_crc(&self, crc: u32, buf: &[u8]) -> u32 {
        let mut c = crc;
        for &b in buf {
            c = self.table[((c ^ u32::from(b)) & 0xff) as usize] ^ (c >> 8);
        }
        c
    }

    fn calculate_crc(&self, data: &[u8]) -> u32 {
        self.update_crc(0xffffffff, data) ^ 0xffffffff
    }
}

/// Splits a NUL-terminated field off the front of `data`.
/// Without a terminator the whole slice is the field.
fn split_null(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|&b| b == 0) {
        Some(pos) => (&data[..pos], &data[pos + 1..]),
        None => (data, &[]),
    }
}

pub struct PngDecoder<'a> {
    data: &'a [u8],
    options: DecodeOptions,
    parsed: bool,
    header: Option<PngImageHeader>,
    palette: Vec<u8>,
    transparency: Option<TransparencyData>,
    ancillary: AncillaryChunks,
    idat_data: Vec<u8>,
    seen_idat: bool,
    actl_info: Option<ActlChunk>,
    frames: Vec<PngFrame>,
    pending_frame: Option<PngFrame>,
    crc: CrcCalculator,
}

impl<'a> PngDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            options: DecodeOptions::default(),
            parsed: false,
            header: None,
            palette: Vec::new(),
            transparency: None,
            ancillary: AncillaryChunks::default(),
            idat_data: Vec::new(),
            seen_idat: false,
            actl_info: None,
            frames: Vec::new(),
            pending_frame: None,
            crc: CrcCalculator::new(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn width(&self) -> u32 {
        self.header.map(|header| header.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.header.map(|header| header.height).unwrap_or(0)
    }

    pub fn header(&self) -> Option<&PngImageHeader> {
        self.header.as_ref()
    }

    pub fn ancillary(&self) -> &AncillaryChunks {
        &self.ancillary
    }

    /// True when the file has `acTL` and at least one usable frame.
    pub fn is_animated(&self) -> bool {
        self.actl_info.is_some() && !self.frames.is_empty()
    }

    pub fn get_info(&self) -> PngInfo {
        PngInfo {
            header: self.header,
            palette_size: self.palette.len() / 3,
            transparency: self.transparency.clone(),
            ancillary: self.ancillary.clone(),
            actl_info: self.actl_info.clone(),
            frames: self.frames.iter().map(|frame| frame.control.clone()).collect(),
        }
    }

    /// Walks every chunk of the file.
    pub fn parse(&mut self) -> AnimaResult<()> {
        if self.parsed {
            return Ok(());
        }

        let mut reader = ByteReader::new(self.data);

        let signature = reader.read_array::<8>()?;
        if signature != PNG_SIGNATURE {
            return Err(AnimaError::format(0, "PNG signature"));
        }

        loop {
            if reader.is_eof() {
                log_warn!("IEND chunk missing, stopping at end of data");
                break;
            }

            let offset = reader.position();
            let length = reader.read_u32_be()? as usize;
            let chunk_type = reader.read_array::<4>()?;
            let data = reader.read_slice(length)?;
            let crc_offset = reader.position();
            let expected_crc = reader.read_u32_be()?;

            if self.options.verify_crc {
                let calculated_crc = self.crc.calculate_crc(&self.data[offset + 4..crc_offset]);

                if calculated_crc != expected_crc {
                    return Err(AnimaError::format(
                        crc_offset,
                        format!(
                            "CRC 0x{:08x} for chunk {:?}, found 0x{:08x}",
                            calculated_crc,
                            String::from_utf8_lossy(&chunk_type),
                            expected_crc
                        ),
                    ));
                }
            }

            let Some(kind) = get_chunk(&chunk_type) else {
                log_debug!("Skipping unknown chunk {:?}", String::from_utf8_lossy(&chunk_type));
                continue;
            };

            if self.header.is_none() && kind != PngChunk::IHDR {
                return Err(AnimaError::format(offset, format!("IHDR chunk, found {:?}", kind)));
            }

            let chunk = Chunk { kind, offset, data };

            match kind {
                PngChunk::IHDR => self.read_ihdr(&chunk)?,
                PngChunk::PLTE => self.read_plte(&chunk),
                PngChunk::IDAT => self.read_idat(&chunk),
                PngChunk::ACTL => self.read_actl(&chunk)?,
                PngChunk::FCTL => self.read_fctl(&chunk)?,
                PngChunk::FDAT => self.read_fdat(&chunk),
                PngChunk::IEND => break,
                _ => {
                    if let Err(e) = self.read_ancillary(&chunk) {
                        log_warn!("Error reading chunk {:?}: {}", chunk.kind, e);
                    }
                }
            }
        }

        self.finish_frame();

        if self.actl_info.is_some() && self.frames.is_empty() {
            log_warn!("acTL present but no usable frames, decoding as a static image");
        }

        if !self.seen_idat && !self.is_animated() {
            return Err(AnimaError::format(self.data.len(), "IDAT chunk"));
        }

        self.parsed = true;

        Ok(())
    }

    fn read_ihdr(&mut self, chunk: &Chunk) -> AnimaResult<()> {
        if self.header.is_some() {
            log_warn!("Ignoring duplicate IHDR chunk");
            return Ok(());
        }

        if chunk.data.len() != 13 {
            return Err(AnimaError::format(
                chunk.offset,
                format!("IHDR length 13, found {}", chunk.data.len()),
            ));
        }

        let mut reader = ByteReader::new(chunk.data);

        let width = reader.read_u32_be()?;
        let height = reader.read_u32_be()?;
        let bit_depth = reader.read_u8()?;
        let color_type = reader.read_u8()?;
        let compression_method = reader.read_u8()?;
        let filter_method = reader.read_u8()?;
        let interlace_method = reader.read_u8()?;

        if width == 0 || height == 0 {
            return Err(AnimaError::InvalidDimensions { width, height });
        }

        let Some((color_type, layout)) = ColorType::from_u8(color_type)
            .and_then(|kind| PixelLayout::new(kind, bit_depth).map(|layout| (kind, layout)))
        else {
            return Err(AnimaError::format(
                chunk.offset + 16,
                format!("valid bit depth and color type, found depth {} type {}", bit_depth, color_type),
            ));
        };

        if compression_method != 0 {
            log_warn!("Invalid compression method: {}", compression_method);
        }

        if filter_method != 0 {
            log_warn!("Invalid filter method: {}", filter_method);
        }

        let interlaced = match interlace_method {
            0 => false,
            1 => true,
            _ => {
                return Err(AnimaError::format(
                    chunk.offset + 20,
                    format!("interlace method 0 or 1, found {}", interlace_method),
                ));
            }
        };

        self.header = Some(PngImageHeader {
            width,
            height,
            bit_depth,
            color_type,
            interlaced,
            layout,
        });

        Ok(())
    }

    fn read_plte(&mut self, chunk: &Chunk) {
        if chunk.data.len() % 3 != 0 {
            log_warn!("PLTE chunk length is not a multiple of 3");
        }

        let entries = chunk.data.len() / 3;
        self.palette = chunk.data[..entries * 3].to_vec();
    }

    fn read_idat(&mut self, chunk: &Chunk) {
        self.seen_idat = true;
        self.idat_data.extend_from_slice(chunk.data);
    }

    fn read_actl(&mut self, chunk: &Chunk) -> AnimaResult<()> {
        if chunk.data.len() != 8 {
            return Err(AnimaError::format(
                chunk.offset,
                format!("acTL length 8, found {}", chunk.data.len()),
            ));
        }

        let mut reader = ByteReader::new(chunk.data);

        let num_frames = reader.read_u32_be()?;
        let num_plays = reader.read_u32_be()?;

        if num_frames == 0 {
            log_warn!("acTL chunk with zero frames");
        }

        self.actl_info = Some(ActlChunk { num_frames, num_plays });

        Ok(())
    }

    /// Moves the frame being collected to the finished list.
    fn finish_frame(&mut self) {
        if let Some(frame) = self.pending_frame.take() {
            if !frame.uses_default_image && frame.data.is_empty() {
                log_warn!("Frame {} has no fdAT data, skipping", frame.control.sequence_number);
                return;
            }

            self.frames.push(frame);
        }
    }

    fn read_fctl(&mut self, chunk: &Chunk) -> AnimaResult<()> {
        self.finish_frame();

        if chunk.data.len() != 26 {
            return Err(AnimaError::format(
                chunk.offset,
                format!("fcTL length 26, found {}", chunk.data.len()),
            ));
        }

        let (image_width, image_height) = (self.width(), self.height());
        let mut reader = ByteReader::new(chunk.data);

        let sequence_number = reader.read_u32_be()?;
        let mut width = reader.read_u32_be()?;
        let mut height = reader.read_u32_be()?;
        let x_offset = reader.read_u32_be()?;
        let y_offset = reader.read_u32_be()?;
        let delay_num = reader.read_u16_be()?;
        let delay_den = reader.read_u16_be()?;
        let dispose_op = reader.read_u8()?;
        let blend_op = reader.read_u8()?;

        if x_offset.saturating_add(width) > image_width {
            log_warn!(
                "fcTL width would overflow actual image width, clamping: x_offset={}, width={}, image_width={}",
                x_offset,
                width,
                image_width
            );
            width = image_width.saturating_sub(x_offset);
        }

        if y_offset.saturating_add(height) > image_height {
            log_warn!(
                "fcTL height would overflow actual image height, clamping: y_offset={}, height={}, image_height={}",
                y_offset,
                height,
                image_height
            );
            height = image_height.saturating_sub(y_offset);
        }

        if width == 0 || height == 0 {
            log_warn!("Skipping empty fcTL frame: width={}, height={}", width, height);
            return Ok(());
        }

        let dispose = match dispose_op {
            0 => DisposalMethod::None,
            1 => DisposalMethod::Background,
            2 => DisposalMethod::Previous,
            _ => {
                log_warn!("Invalid fcTL dispose_op: {}", dispose_op);
                DisposalMethod::None
            }
        };

        let blend = match blend_op {
            0 => BlendOp::Source,
            1 => BlendOp::Over,
            _ => {
                log_warn!("Invalid fcTL blend_op: {}", blend_op);
                BlendOp::Source
            }
        };

        self.pending_frame = Some(PngFrame {
            control: FrameControl {
                sequence_number,
                rect: Rect::new(x_offset, y_offset, width, height),
                delay_num,
                delay_den,
                dispose,
                blend,
            },
            uses_default_image: !self.seen_idat,
            data: Vec::new(),
        });

        Ok(())
    }

    fn read_fdat(&mut self, chunk: &Chunk) {
        if chunk.data.len() < 4 {
            log_warn!("fdAT chunk too short for a sequence number");
            return;
        }

        match self.pending_frame.as_mut() {
            Some(frame) if !frame.uses_default_image => frame.data.extend_from_slice(&chunk.data[4..]),
            Some(_) => log_warn!("fdAT chunk inside the default image frame, ignoring"),
            None => log_warn!("fdAT chunk without preceding fcTL chunk"),
        }
    }

    fn read_ancillary(&mut self, chunk: &Chunk) -> AnimaResult<()> {
        let mut reader = ByteReader::new(chunk.data);

        match chunk.kind {
            PngChunk::TRNS => self.read_trns(chunk.data, &mut reader)?,
            PngChunk::GAMA => {
                self.ancillary.gamma = Some(reader.read_u32_be()? as f32 / 100000.0);
            }
            PngChunk::SRGB => {
                let intent = match reader.read_u8()? {
                    0 => RenderingIntent::Perceptual,
                    1 => RenderingIntent::RelativeColorimetric,
                    2 => RenderingIntent::Saturation,
                    3 => RenderingIntent::AbsoluteColorimetric,
                    n => {
                        log_warn!("Invalid sRGB rendering intent: {}", n);
                        RenderingIntent::Perceptual
                    }
                };

                self.ancillary.rendering_intent = Some(intent);
            }
            PngChunk::CHRM => {
                let mut values = [0f32; 8];
                for value in values.iter_mut() {
                    *value = reader.read_u32_be()? as f32 / 100000.0;
                }

                self.ancillary.chromaticities = Some(Chromaticities {
                    white_point_x: values[0],
                    white_point_y: values[1],
                    red_x: values[2],
                    red_y: values[3],
                    green_x: values[4],
                    green_y: values[5],
                    blue_x: values[6],
                    blue_y: values[7],
                });
            }
            PngChunk::BKGD => self.read_bkgd(&mut reader)?,
            PngChunk::PHYS => {
                let pixels_per_unit_x = reader.read_u32_be()?;
                let pixels_per_unit_y = reader.read_u32_be()?;
                let unit = match reader.read_u8()? {
                    1 => PhysicalUnit::Meter,
                    _ => PhysicalUnit::Unknown,
                };

                self.ancillary.physical_dimensions = Some(PhysicalDimensions {
                    pixels_per_unit_x,
                    pixels_per_unit_y,
                    unit,
                });
            }
            PngChunk::HIST => {
                if self.palette.is_empty() {
                    log_warn!("Encountered hIST chunk before PLTE chunk");
                    return Ok(());
                }

                let frequencies = chunk
                    .data
                    .chunks_exact(2)
                    .take(self.palette.len() / 3)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();

                self.ancillary.histogram = Some(frequencies);
            }
            PngChunk::TEXT => {
                let (keyword, text) = split_null(chunk.data);

                self.ancillary.text_chunks.push(PngText::Basic {
                    keyword: decode_text(keyword),
                    text: decode_text(text),
                });
            }
            PngChunk::ZTXT => {
                let (keyword, rest) = split_null(chunk.data);
                let mut reader = ByteReader::new(rest);

                let compression_method = reader.read_u8()?;
                if compression_method != 0 {
                    log_warn!("Unknown compression method in zTXt chunk: {}", compression_method);
                    return Ok(());
                }

                let text = inflate(reader.read_slice(reader.remaining())?, self.options.strict_inflate)?;

                self.ancillary.text_chunks.push(PngText::Compressed {
                    keyword: decode_text(keyword),
                    text: decode_text(&text),
                });
            }
            PngChunk::ITXT => {
                let (keyword, rest) = split_null(chunk.data);
                let mut reader = ByteReader::new(rest);

                let compression_flag = reader.read_u8()?;
                let compression_method = reader.read_u8()?;

                let (language_tag, rest) = split_null(reader.read_slice(reader.remaining())?);
                let (translated_keyword, text) = split_null(rest);

                let text = if compression_flag == 1 {
                    if compression_method != 0 {
                        log_warn!("Invalid compression method in iTXt chunk: {}", compression_method);
                    }

                    decode_text(&inflate(text, self.options.strict_inflate)?)
                } else {
                    decode_text(text)
                };

                self.ancillary.text_chunks.push(PngText::International {
                    keyword: decode_text(keyword),
                    language_tag: decode_text(language_tag),
                    translated_keyword: decode_text(translated_keyword),
                    text,
                });
            }
            _ => {}
        }

        Ok(())
    }

    fn read_trns(&mut self, data: &[u8], reader: &mut ByteReader) -> AnimaResult<()> {
        let color_type = self.header.map(|header| header.color_type).unwrap_or(ColorType::RGB);

        let trns_data = match color_type {
            ColorType::Grayscale => TransparencyData::Grayscale(reader.read_u16_be()?),
            ColorType::RGB => {
                let r = reader.read_u16_be()?;
                let g = reader.read_u16_be()?;
                let b = reader.read_u16_be()?;

                TransparencyData::RGB(r, g, b)
            }
            ColorType::Indexed => {
                if self.palette.is_empty() {
                    log_warn!("tRNS chunk before PLTE chunk");
                }

                TransparencyData::Palette(data.to_vec())
            }
            _ => {
                log_warn!("tRNS chunk not allowed for color type {:?}", color_type);
                return Ok(());
            }
        };

        self.transparency = Some(trns_data);

        Ok(())
    }

    fn read_bkgd(&mut self, reader: &mut ByteReader) -> AnimaResult<()> {
        let color_type = self.header.map(|header| header.color_type).unwrap_or(ColorType::RGB);

        let background = match color_type {
            ColorType::Grayscale | ColorType::GrayscaleAlpha => BackgroundData::Grayscale(reader.read_u16_be()?),
            ColorType::RGB | ColorType::RGBA => {
                let r = reader.read_u16_be()?;
                let g = reader.read_u16_be()?;
                let b = reader.read_u16_be()?;

                BackgroundData::RGB(r, g, b)
            }
            ColorType::Indexed => BackgroundData::PaletteIndex(reader.read_u8()?),
        };

        self.ancillary.background = Some(background);

        Ok(())
    }

    pub fn decode(&mut self) -> AnimaResult<RasterAnimation> {
        self.parse()?;

        let header = self
            .header
            .ok_or_else(|| AnimaError::format(PNG_SIGNATURE.len(), "IHDR chunk"))?;

        let ctx = ColorContext::new(&self.palette, self.transparency.as_ref());
        let strict_inflate = self.options.strict_inflate;
        let idat_data = &self.idat_data;

        if !self.is_animated() {
            let inflated = inflate(idat_data, strict_inflate)?;
            let pixels = reconstruct(&inflated, header.width, header.height, header.layout, header.interlaced, &ctx);
            let frame = Frame::new(header.width, header.height, pixels, 0);

            return Ok(RasterAnimation::new(header.width, header.height, vec![frame], None));
        }

        let decode_frame = |frame: &PngFrame| -> AnimaResult<Vec<u8>> {
            let data = if frame.uses_default_image { idat_data } else { &frame.data };
            let inflated = inflate(data, strict_inflate)?;
            let rect = frame.control.rect;

            Ok(reconstruct(&inflated, rect.width, rect.height, header.layout, header.interlaced, &ctx))
        };

        #[cfg(feature = "rayon")]
        let blocks = self.frames.par_iter().map(decode_frame).collect::<AnimaResult<Vec<_>>>()?;

        #[cfg(not(feature = "rayon"))]
        let blocks = self.frames.iter().map(decode_frame).collect::<AnimaResult<Vec<_>>>()?;

        let mut compositor = Compositor::new(header.width, header.height);

        for (frame, pixels) in self.frames.iter().zip(blocks) {
            let control = &frame.control;

            compositor.compose(control.rect, control.dispose, control.delay_ms(), |canvas| {
                canvas.draw_rgba(control.rect, &pixels, control.blend)
            });
        }

        let num_plays = self.actl_info.as_ref().map(|actl| actl.num_plays);

        Ok(RasterAnimation::new(header.width, header.height, compositor.into_frames(), num_plays))
    }
}
