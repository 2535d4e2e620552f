//! PNG scanline reconstruction: inflate, de-filter, Adam7 de-interlace and
//! expansion of every supported color type and bit depth to RGBA8.

use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::Serialize;

use crate::log_warn;
use crate::utils::error::{AnimaError, AnimaResult};

const ADAM7_ROW_START: [usize; 7] = [0, 0, 4, 0, 2, 0, 1];
const ADAM7_COL_START: [usize; 7] = [0, 4, 0, 2, 0, 1, 0];
const ADAM7_ROW_DELTA: [usize; 7] = [8, 8, 8, 4, 4, 2, 2];
const ADAM7_COL_DELTA: [usize; 7] = [8, 8, 4, 4, 2, 2, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorType {
    Grayscale = 0,
    RGB = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    RGBA = 6,
}

impl ColorType {
    pub fn from_u8(value: u8) -> Option<ColorType> {
        match value {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::RGB),
            3 => Some(ColorType::Indexed),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::RGBA),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

/// Contents of a `tRNS` chunk. Keys are stored at full sample precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransparencyData {
    Grayscale(u16),
    RGB(u16, u16, u16),
    Palette(Vec<u8>),
}

/// Palette and transparency needed to turn samples into RGBA.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorContext<'a> {
    /// RGB triplets from `PLTE`.
    pub palette: &'a [u8],
    pub transparency: Option<&'a TransparencyData>,
}

impl<'a> ColorContext<'a> {
    pub fn new(palette: &'a [u8], transparency: Option<&'a TransparencyData>) -> Self {
        ColorContext { palette, transparency }
    }

    fn gray_key(&self) -> Option<u16> {
        match self.transparency {
            Some(TransparencyData::Grayscale(key)) => Some(*key),
            _ => None,
        }
    }

    fn rgb_key(&self) -> Option<[u16; 3]> {
        match self.transparency {
            Some(TransparencyData::RGB(r, g, b)) => Some([*r, *g, *b]),
            _ => None,
        }
    }

    /// RGBA for a palette index. Indices past the palette are opaque black.
    fn palette_entry(&self, index: usize) -> [u8; 4] {
        let Some(rgb) = self.palette.get(index * 3..index * 3 + 3) else {
            return [0, 0, 0, 255];
        };

        let alpha = match self.transparency {
            Some(TransparencyData::Palette(alphas)) => alphas.get(index).copied().unwrap_or(255),
            _ => 255,
        };

        [rgb[0], rgb[1], rgb[2], alpha]
    }
}

/// Expands one de-filtered row into RGBA8. The output length fixes the pixel count.
type RowExpander = fn(row: &[u8], ctx: &ColorContext, out: &mut [u8]);

/// Every valid combination of color type and bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelLayout {
    Gray1,
    Gray2,
    Gray4,
    Gray8,
    Gray16,
    Rgb8,
    Rgb16,
    Indexed1,
    Indexed2,
    Indexed4,
    Indexed8,
    GrayAlpha8,
    GrayAlpha16,
    Rgba8,
    Rgba16,
}

// Indexed by `PixelLayout as usize`.
const EXPANDERS: [RowExpander; 15] = [
    expand_gray_packed::<1>,
    expand_gray_packed::<2>,
    expand_gray_packed::<4>,
    expand_gray8,
    expand_gray16,
    expand_rgb8,
    expand_rgb16,
    expand_indexed_packed::<1>,
    expand_indexed_packed::<2>,
    expand_indexed_packed::<4>,
    expand_indexed8,
    expand_gray_alpha8,
    expand_gray_alpha16,
    expand_rgba8,
    expand_rgba16,
];

impl PixelLayout {
    /// Returns `None` for combinations PNG does not allow.
    pub fn new(color_type: ColorType, bit_depth: u8) -> Option<PixelLayout> {
        let layout = match (color_type, bit_depth) {
            (ColorType::Grayscale, 1) => PixelLayout::Gray1,
            (ColorType::Grayscale, 2) => PixelLayout::Gray2,
            (ColorType::Grayscale, 4) => PixelLayout::Gray4,
            (ColorType::Grayscale, 8) => PixelLayout::Gray8,
            (ColorType::Grayscale, 16) => PixelLayout::Gray16,
            (ColorType::RGB, 8) => PixelLayout::Rgb8,
            (ColorType::RGB, 16) => PixelLayout::Rgb16,
            (ColorType::Indexed, 1) => PixelLayout::Indexed1,
            (ColorType::Indexed, 2) => PixelLayout::Indexed2,
            (ColorType::Indexed, 4) => PixelLayout::Indexed4,
            (ColorType::Indexed, 8) => PixelLayout::Indexed8,
            (ColorType::GrayscaleAlpha, 8) => PixelLayout::GrayAlpha8,
            (ColorType::GrayscaleAlpha, 16) => PixelLayout::GrayAlpha16,
            (ColorType::RGBA, 8) => PixelLayout::Rgba8,
            (ColorType::RGBA, 16) => PixelLayout::Rgba16,
            _ => return None,
        };

        Some(layout)
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            PixelLayout::Gray1 | PixelLayout::Indexed1 => 1,
            PixelLayout::Gray2 | PixelLayout::Indexed2 => 2,
            PixelLayout::Gray4 | PixelLayout::Indexed4 => 4,
            PixelLayout::Gray16 | PixelLayout::Rgb16 | PixelLayout::GrayAlpha16 | PixelLayout::Rgba16 => 16,
            _ => 8,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Rgb16 => 3,
            PixelLayout::GrayAlpha8 | PixelLayout::GrayAlpha16 => 2,
            PixelLayout::Rgba8 | PixelLayout::Rgba16 => 4,
            _ => 1,
        }
    }

    pub fn bits_per_pixel(&self) -> usize {
        self.channels() * self.bit_depth() as usize
    }

    fn expander(&self) -> RowExpander {
        EXPANDERS[*self as usize]
    }
}

/// Number of bytes in one scanline, excluding the filter byte.
pub fn bytes_per_line(width: usize, bits_per_pixel: usize) -> usize {
    (width * bits_per_pixel).div_ceil(8)
}

/// Reads a sample of `depth` bits (1, 2 or 4) from an MSB-first packed row.
fn packed_sample(row: &[u8], index: usize, depth: u8) -> u8 {
    let bit = index * depth as usize;
    let shift = 8 - depth as usize - (bit % 8);
    let mask = (1u16 << depth) as u8 - 1;

    (row[bit / 8] >> shift) & mask
}

fn sample16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn expand_gray_packed<const DEPTH: u8>(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    let scale = (255 / ((1u32 << DEPTH) - 1)) as u8;
    let key = ctx.gray_key();

    for (x, pixel) in out.chunks_exact_mut(4).enumerate() {
        let value = packed_sample(row, x, DEPTH);
        let gray = value * scale;
        let alpha = if key == Some(value as u16) { 0 } else { 255 };

        pixel.copy_from_slice(&[gray, gray, gray, alpha]);
    }
}

fn expand_gray8(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    let key = ctx.gray_key();

    for (&gray, pixel) in row.iter().zip(out.chunks_exact_mut(4)) {
        let alpha = if key == Some(gray as u16) { 0 } else { 255 };
        pixel.copy_from_slice(&[gray, gray, gray, alpha]);
    }
}

fn expand_gray16(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    let key = ctx.gray_key();

    for (sample, pixel) in row.chunks_exact(2).zip(out.chunks_exact_mut(4)) {
        let alpha = if key == Some(sample16(sample)) { 0 } else { 255 };
        pixel.copy_from_slice(&[sample[0], sample[0], sample[0], alpha]);
    }
}

fn expand_rgb8(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    let key = ctx.rgb_key();

    for (rgb, pixel) in row.chunks_exact(3).zip(out.chunks_exact_mut(4)) {
        let value = [rgb[0] as u16, rgb[1] as u16, rgb[2] as u16];
        let alpha = if key == Some(value) { 0 } else { 255 };
        pixel.copy_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]);
    }
}

fn expand_rgb16(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    let key = ctx.rgb_key();

    for (rgb, pixel) in row.chunks_exact(6).zip(out.chunks_exact_mut(4)) {
        let value = [sample16(&rgb[0..2]), sample16(&rgb[2..4]), sample16(&rgb[4..6])];
        let alpha = if key == Some(value) { 0 } else { 255 };
        pixel.copy_from_slice(&[rgb[0], rgb[2], rgb[4], alpha]);
    }
}

fn expand_indexed_packed<const DEPTH: u8>(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    for (x, pixel) in out.chunks_exact_mut(4).enumerate() {
        let index = packed_sample(row, x, DEPTH);
        pixel.copy_from_slice(&ctx.palette_entry(index as usize));
    }
}

fn expand_indexed8(row: &[u8], ctx: &ColorContext, out: &mut [u8]) {
    for (&index, pixel) in row.iter().zip(out.chunks_exact_mut(4)) {
        pixel.copy_from_slice(&ctx.palette_entry(index as usize));
    }
}

fn expand_gray_alpha8(row: &[u8], _ctx: &ColorContext, out: &mut [u8]) {
    for (ga, pixel) in row.chunks_exact(2).zip(out.chunks_exact_mut(4)) {
        pixel.copy_from_slice(&[ga[0], ga[0], ga[0], ga[1]]);
    }
}

fn expand_gray_alpha16(row: &[u8], _ctx: &ColorContext, out: &mut [u8]) {
    for (ga, pixel) in row.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        pixel.copy_from_slice(&[ga[0], ga[0], ga[0], ga[2]]);
    }
}

fn expand_rgba8(row: &[u8], _ctx: &ColorContext, out: &mut [u8]) {
    let len = out.len().min(row.len());
    out[..len].copy_from_slice(&row[..len]);
}

fn expand_rgba16(row: &[u8], _ctx: &ColorContext, out: &mut [u8]) {
    for (rgba, pixel) in row.chunks_exact(8).zip(out.chunks_exact_mut(4)) {
        pixel.copy_from_slice(&[rgba[0], rgba[2], rgba[4], rgba[6]]);
    }
}

/// Inflates a zlib stream.
///
/// # Parameters
/// - `data`: zlib-wrapped DEFLATE data
/// - `strict`: treat a corrupt or truncated stream as an error
///
/// # Returns
/// - The inflated bytes. In lenient mode a broken stream yields whatever was
///   produced before the error.
/// - `AnimaError::Decompression` in strict mode
pub fn inflate(data: &[u8], strict: bool) -> AnimaResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::new();

    if let Err(e) = decoder.read_to_end(&mut output) {
        if strict {
            return Err(AnimaError::Decompression(e.to_string()));
        }

        log_warn!("Corrupt zlib stream, keeping {} bytes inflated before the error: {}", output.len(), e);
    }

    Ok(output)
}

/// PNG Paeth predictor: `a` = left, `b` = above, `c` = upper left.
pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn decode_sub_filter(row: &mut [u8], bytes_per_pixel: usize) {
    for i in bytes_per_pixel..row.len() {
        row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
    }
}

fn decode_up_filter(row: &mut [u8], prior: &[u8]) {
    for (value, &above) in row.iter_mut().zip(prior) {
        *value = value.wrapping_add(above);
    }
}

fn decode_average_filter(row: &mut [u8], prior: &[u8], bytes_per_pixel: usize) {
    for i in 0..row.len() {
        let left = if i >= bytes_per_pixel { row[i - bytes_per_pixel] as u16 } else { 0 };
        let above = prior[i] as u16;

        row[i] = row[i].wrapping_add(((left + above) >> 1) as u8);
    }
}

fn decode_paeth_filter(row: &mut [u8], prior: &[u8], bytes_per_pixel: usize) {
    for i in 0..row.len() {
        let (left, upper_left) = if i >= bytes_per_pixel {
            (row[i - bytes_per_pixel], prior[i - bytes_per_pixel])
        } else {
            (0, 0)
        };

        row[i] = row[i].wrapping_add(paeth_predictor(left, prior[i], upper_left));
    }
}

/// Reverses the per-row filters of one (sub-)image.
///
/// # Parameters
/// - `data`: inflated rows, each `[filter byte][bytes_per_line bytes]`
/// - `width`, `height`: size of the image in pixels
/// - `bits_per_pixel`: bits of one packed pixel
///
/// # Returns
/// - `height * bytes_per_line` bytes of packed samples. Rows missing from
///   `data` stay zero.
pub fn unfilter_scanlines(data: &[u8], width: usize, height: usize, bits_per_pixel: usize) -> Vec<u8> {
    let stride = bytes_per_line(width, bits_per_pixel);
    let bytes_per_pixel = bits_per_pixel.div_ceil(8).max(1);
    let mut output = vec![0u8; stride * height];

    if stride == 0 {
        return output;
    }

    let zero_row = vec![0u8; stride];
    let mut scanlines = data.chunks(stride + 1);

    for y in 0..height {
        let Some(scanline) = scanlines.next().filter(|line| line.len() == stride + 1) else {
            log_warn!("Image data ended after {} of {} rows", y, height);
            break;
        };

        let (done, rest) = output.split_at_mut(y * stride);
        let prior = if y == 0 { &zero_row[..] } else { &done[(y - 1) * stride..] };
        let row = &mut rest[..stride];

        row.copy_from_slice(&scanline[1..]);

        let filter_type = match scanline[0] {
            0 => FilterType::None,
            1 => FilterType::Sub,
            2 => FilterType::Up,
            3 => FilterType::Average,
            4 => FilterType::Paeth,
            other => {
                log_warn!("Invalid filter type {} in row {}", other, y);
                FilterType::None
            }
        };

        match filter_type {
            FilterType::None => {}
            FilterType::Sub => decode_sub_filter(row, bytes_per_pixel),
            FilterType::Up => decode_up_filter(row, prior),
            FilterType::Average => decode_average_filter(row, prior, bytes_per_pixel),
            FilterType::Paeth => decode_paeth_filter(row, prior, bytes_per_pixel),
        }
    }

    output
}

/// Size of Adam7 pass `pass` for an image of `width` x `height`.
pub fn adam7_pass_size(pass: usize, width: usize, height: usize) -> (usize, usize) {
    let pass_width = width.saturating_sub(ADAM7_COL_START[pass]).div_ceil(ADAM7_COL_DELTA[pass]);
    let pass_height = height.saturating_sub(ADAM7_ROW_START[pass]).div_ceil(ADAM7_ROW_DELTA[pass]);

    (pass_width, pass_height)
}

/// De-filters the seven Adam7 passes and scatters them into one packed
/// full-resolution buffer of `height * bytes_per_line` bytes.
pub fn deinterlace_adam7(data: &[u8], width: usize, height: usize, bits_per_pixel: usize) -> Vec<u8> {
    let stride = bytes_per_line(width, bits_per_pixel);
    let mut output = vec![0u8; stride * height];
    let mut data_offset = 0;

    for pass in 0..7 {
        let (pass_width, pass_height) = adam7_pass_size(pass, width, height);

        if pass_width == 0 || pass_height == 0 {
            continue;
        }

        let pass_stride = bytes_per_line(pass_width, bits_per_pixel);
        let pass_size = (pass_stride + 1) * pass_height;
        let pass_data = data.get(data_offset..).unwrap_or(&[]);
        let pass_data = &pass_data[..pass_size.min(pass_data.len())];

        let unfiltered = unfilter_scanlines(pass_data, pass_width, pass_height, bits_per_pixel);

        for (row, src) in unfiltered.chunks_exact(pass_stride).enumerate() {
            let out_y = row * ADAM7_ROW_DELTA[pass] + ADAM7_ROW_START[pass];
            let dst = &mut output[out_y * stride..(out_y + 1) * stride];

            for col in 0..pass_width {
                let out_x = col * ADAM7_COL_DELTA[pass] + ADAM7_COL_START[pass];
                scatter_pixel(src, col, dst, out_x, bits_per_pixel);
            }
        }

        data_offset += pass_size;
    }

    output
}

/// Copies pixel `src_x` of a packed row to position `dst_x` of another.
fn scatter_pixel(src: &[u8], src_x: usize, dst: &mut [u8], dst_x: usize, bits_per_pixel: usize) {
    if bits_per_pixel >= 8 {
        let bytes = bits_per_pixel / 8;
        dst[dst_x * bytes..(dst_x + 1) * bytes].copy_from_slice(&src[src_x * bytes..(src_x + 1) * bytes]);
        return;
    }

    let depth = bits_per_pixel as u8;
    let value = packed_sample(src, src_x, depth);

    let bit = dst_x * bits_per_pixel;
    let shift = 8 - bits_per_pixel - (bit % 8);
    let mask = ((1u16 << depth) as u8 - 1) << shift;

    dst[bit / 8] = (dst[bit / 8] & !mask) | (value << shift);
}

/// Turns inflated image data into RGBA8 pixels.
///
/// # Parameters
/// - `data`: inflated scanlines (all seven passes when `interlaced`)
/// - `width`, `height`: size of the image or APNG frame
/// - `layout`: color type and bit depth from `IHDR`
/// - `interlaced`: data is Adam7 ordered
/// - `ctx`: palette and transparency
///
/// # Returns
/// - `width * height * 4` bytes
pub fn reconstruct(
    data: &[u8],
    width: u32,
    height: u32,
    layout: PixelLayout,
    interlaced: bool,
    ctx: &ColorContext,
) -> Vec<u8> {
    let width = width as usize;
    let height = height as usize;
    let mut rgba = vec![0u8; width * height * 4];

    if width == 0 || height == 0 {
        return rgba;
    }

    let bits_per_pixel = layout.bits_per_pixel();
    let packed = if interlaced {
        deinterlace_adam7(data, width, height, bits_per_pixel)
    } else {
        unfilter_scanlines(data, width, height, bits_per_pixel)
    };

    let expand = layout.expander();
    let stride = bytes_per_line(width, bits_per_pixel);

    for (row, out) in packed.chunks_exact(stride).zip(rgba.chunks_exact_mut(width * 4)) {
        expand(row, ctx, out);
    }

    rgba
}
