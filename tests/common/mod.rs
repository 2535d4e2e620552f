#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Deterministic byte sequence for larger fixtures.
pub fn pseudo_random(len: usize, seed: u32, modulo: u16) -> Vec<u8> {
    let mut state = seed;

    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            ((state >> 16) % modulo as u32) as u8
        })
        .collect()
}

struct BitWriter {
    bytes: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { bytes: Vec::new(), acc: 0, bits: 0 }
    }

    fn write(&mut self, code: u16, width: u8) {
        self.acc |= (code as u32) << self.bits;
        self.bits += width;

        while self.bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push(self.acc as u8);
        }

        self.bytes
    }
}

/// Reference GIF LZW encoder producing a packed code stream (no sub-block framing).
pub fn lzw_encode(min_code_size: u8, data: &[u8]) -> Vec<u8> {
    let clear_code: u16 = 1 << min_code_size;
    let end_code = clear_code + 1;

    let mut writer = BitWriter::new();
    let mut dictionary: HashMap<(u16, u8), u16> = HashMap::new();
    let mut width = min_code_size + 1;
    let mut next_code = end_code + 1;
    // Size of the decoder's table, which trails ours by one entry.
    let mut decoder_next = end_code + 1;
    let mut first = true;

    writer.write(clear_code, width);

    let mut emit = |writer: &mut BitWriter, code: u16, width: &mut u8| {
        writer.write(code, *width);

        if first {
            first = false;
        } else if decoder_next < 4096 {
            decoder_next += 1;
        }

        if decoder_next >= (1 << *width) && *width < 12 {
            *width += 1;
        }
    };

    let mut prefix: Option<u16> = None;

    for &byte in data {
        match prefix {
            None => prefix = Some(byte as u16),
            Some(current) => {
                if let Some(&code) = dictionary.get(&(current, byte)) {
                    prefix = Some(code);
                } else {
                    emit(&mut writer, current, &mut width);

                    if next_code < 4096 {
                        dictionary.insert((current, byte), next_code);
                        next_code += 1;
                    }

                    prefix = Some(byte as u16);
                }
            }
        }
    }

    if let Some(current) = prefix {
        emit(&mut writer, current, &mut width);
    }

    writer.write(end_code, width);
    writer.finish()
}

/// Frames data as GIF sub-blocks of at most 255 bytes plus the terminator.
pub fn sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();

    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }

    out.push(0);
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GifControl {
    pub disposal: u8,
    pub delay: u16,
    pub transparent: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct GifFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Palette indices in display order.
    pub indices: Vec<u8>,
    pub local_palette: Option<Vec<[u8; 3]>>,
    pub interlaced: bool,
    pub control: Option<GifControl>,
}

impl GifFrame {
    pub fn new(left: u16, top: u16, width: u16, height: u16, indices: Vec<u8>) -> Self {
        GifFrame {
            left,
            top,
            width,
            height,
            indices,
            local_palette: None,
            interlaced: false,
            control: None,
        }
    }

    pub fn with_control(mut self, disposal: u8, delay: u16, transparent: Option<u8>) -> Self {
        self.control = Some(GifControl {
            disposal,
            delay,
            transparent,
        });
        self
    }

    pub fn with_local_palette(mut self, palette: Vec<[u8; 3]>) -> Self {
        self.local_palette = Some(palette);
        self
    }

    pub fn interlaced(mut self) -> Self {
        self.interlaced = true;
        self
    }
}

/// Color table size field: the table holds `2 << field` entries.
fn palette_size_field(len: usize) -> u8 {
    let mut field = 0;
    while (2usize << field) < len {
        field += 1;
    }
    field
}

fn write_palette(out: &mut Vec<u8>, palette: &[[u8; 3]]) {
    let entries = 2usize << palette_size_field(palette.len());

    for i in 0..entries {
        out.extend_from_slice(&palette.get(i).copied().unwrap_or([0, 0, 0]));
    }
}

/// Reorders display-order rows into the GIF four-pass storage order.
pub fn interlace_rows(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len());

    for (start, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        let mut row = start;
        while row < height {
            out.extend_from_slice(&indices[row * width..(row + 1) * width]);
            row += step;
        }
    }

    out
}

pub fn netscape_extension(loop_count: u16) -> Vec<u8> {
    let mut out = vec![0x21, 0xFF, 0x0B];
    out.extend_from_slice(b"NETSCAPE2.0");
    out.extend_from_slice(&[0x03, 0x01]);
    out.extend_from_slice(&loop_count.to_le_bytes());
    out.push(0x00);
    out
}

/// Everything up to and including the global color table.
pub fn gif_header(width: u16, height: u16, palette: &[[u8; 3]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());

    if palette.is_empty() {
        out.extend_from_slice(&[0x00, 0x00, 0x00]);
    } else {
        out.extend_from_slice(&[0x80 | 0x70 | palette_size_field(palette.len()), 0x00, 0x00]);
        write_palette(&mut out, palette);
    }

    out
}

pub fn gif_frame(frame: &GifFrame) -> Vec<u8> {
    let mut out = Vec::new();

    if let Some(control) = frame.control {
        let packed = (control.disposal << 2) | control.transparent.map(|_| 1).unwrap_or(0);
        out.extend_from_slice(&[0x21, 0xF9, 0x04, packed]);
        out.extend_from_slice(&control.delay.to_le_bytes());
        out.extend_from_slice(&[control.transparent.unwrap_or(0), 0x00]);
    }

    out.push(0x2C);
    out.extend_from_slice(&frame.left.to_le_bytes());
    out.extend_from_slice(&frame.top.to_le_bytes());
    out.extend_from_slice(&frame.width.to_le_bytes());
    out.extend_from_slice(&frame.height.to_le_bytes());

    let mut packed = 0u8;
    if frame.interlaced {
        packed |= 0x40;
    }
    if let Some(palette) = &frame.local_palette {
        packed |= 0x80 | palette_size_field(palette.len());
    }
    out.push(packed);

    if let Some(palette) = &frame.local_palette {
        write_palette(&mut out, palette);
    }

    let indices = if frame.interlaced {
        interlace_rows(&frame.indices, frame.width as usize, frame.height as usize)
    } else {
        frame.indices.clone()
    };

    let max_index = indices.iter().copied().max().unwrap_or(0) as u32;
    let mut min_code_size = 2u8;
    while (1u32 << min_code_size) <= max_index {
        min_code_size += 1;
    }

    out.push(min_code_size);
    out.extend_from_slice(&sub_blocks(&lzw_encode(min_code_size, &indices)));

    out
}

pub fn build_gif(width: u16, height: u16, palette: &[[u8; 3]], loop_count: Option<u16>, frames: &[GifFrame]) -> Vec<u8> {
    let mut out = gif_header(width, height, palette);

    if let Some(count) = loop_count {
        out.extend_from_slice(&netscape_extension(count));
    }

    for frame in frames {
        out.extend_from_slice(&gif_frame(frame));
    }

    out.push(0x3B);
    out
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }

    !crc
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory write");
    encoder.finish().expect("in-memory write")
}

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub struct PngBuilder {
    bytes: Vec<u8>,
}

impl PngBuilder {
    pub fn new() -> Self {
        PngBuilder {
            bytes: PNG_SIGNATURE.to_vec(),
        }
    }

    pub fn chunk(mut self, tag: &[u8; 4], data: &[u8]) -> Self {
        self.bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());

        let start = self.bytes.len();
        self.bytes.extend_from_slice(tag);
        self.bytes.extend_from_slice(data);

        let crc = crc32(&self.bytes[start..]);
        self.bytes.extend_from_slice(&crc.to_be_bytes());
        self
    }

    pub fn ihdr(self, width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);

        self.chunk(b"IHDR", &data)
    }

    pub fn actl(self, num_frames: u32, num_plays: u32) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&num_frames.to_be_bytes());
        data.extend_from_slice(&num_plays.to_be_bytes());

        self.chunk(b"acTL", &data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fctl(
        self,
        sequence: u32,
        rect: (u32, u32, u32, u32),
        delay_num: u16,
        delay_den: u16,
        dispose_op: u8,
        blend_op: u8,
    ) -> Self {
        let (x, y, width, height) = rect;
        let mut data = Vec::new();
        data.extend_from_slice(&sequence.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&x.to_be_bytes());
        data.extend_from_slice(&y.to_be_bytes());
        data.extend_from_slice(&delay_num.to_be_bytes());
        data.extend_from_slice(&delay_den.to_be_bytes());
        data.extend_from_slice(&[dispose_op, blend_op]);

        self.chunk(b"fcTL", &data)
    }

    pub fn fdat(self, sequence: u32, compressed: &[u8]) -> Self {
        let mut data = sequence.to_be_bytes().to_vec();
        data.extend_from_slice(compressed);

        self.chunk(b"fdAT", &data)
    }

    /// Appends IEND.
    pub fn finish(self) -> Vec<u8> {
        self.chunk(b"IEND", &[]).bytes
    }

    pub fn finish_without_iend(self) -> Vec<u8> {
        self.bytes
    }
}

fn reference_paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Filters packed rows with the given per-row filter types (cycled) and
/// prefixes each row with its filter byte.
pub fn filter_rows(raw: &[u8], stride: usize, bytes_per_pixel: usize, filters: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let zero = vec![0u8; stride];

    for (y, row) in raw.chunks(stride).enumerate() {
        let prior = if y == 0 { &zero[..] } else { &raw[(y - 1) * stride..y * stride] };
        let filter = filters[y % filters.len()];

        out.push(filter);

        for i in 0..stride {
            let a = if i >= bytes_per_pixel { row[i - bytes_per_pixel] } else { 0 };
            let b = prior[i];
            let c = if i >= bytes_per_pixel { prior[i - bytes_per_pixel] } else { 0 };

            let predictor = match filter {
                0 => 0,
                1 => a,
                2 => b,
                3 => ((a as u16 + b as u16) / 2) as u8,
                _ => reference_paeth(a, b, c),
            };

            out.push(row[i].wrapping_sub(predictor));
        }
    }

    out
}

fn get_pixel_bits(row: &[u8], x: usize, bits_per_pixel: usize) -> Vec<u8> {
    if bits_per_pixel >= 8 {
        let bytes = bits_per_pixel / 8;
        return row[x * bytes..(x + 1) * bytes].to_vec();
    }

    let bit = x * bits_per_pixel;
    let shift = 8 - bits_per_pixel - bit % 8;
    vec![(row[bit / 8] >> shift) & ((1 << bits_per_pixel) - 1)]
}

fn set_pixel_bits(row: &mut [u8], x: usize, bits_per_pixel: usize, value: &[u8]) {
    if bits_per_pixel >= 8 {
        let bytes = bits_per_pixel / 8;
        row[x * bytes..(x + 1) * bytes].copy_from_slice(value);
        return;
    }

    let bit = x * bits_per_pixel;
    let shift = 8 - bits_per_pixel - bit % 8;
    row[bit / 8] |= value[0] << shift;
}

/// Reference Adam7 interlacer: splits packed full-resolution rows into the seven
/// passes, filters each pass and concatenates them.
pub fn adam7_interlace(raw: &[u8], width: usize, height: usize, bits_per_pixel: usize, filters: &[u8]) -> Vec<u8> {
    let passes = [
        (0, 0, 8, 8),
        (4, 0, 8, 8),
        (0, 4, 4, 8),
        (2, 0, 4, 4),
        (0, 2, 2, 4),
        (1, 0, 2, 2),
        (0, 1, 1, 2),
    ];

    let stride = (width * bits_per_pixel).div_ceil(8);
    let bytes_per_pixel = bits_per_pixel.div_ceil(8);
    let mut out = Vec::new();

    for (x0, y0, dx, dy) in passes {
        let xs: Vec<usize> = (x0..width).step_by(dx).collect();
        let ys: Vec<usize> = (y0..height).step_by(dy).collect();

        if xs.is_empty() || ys.is_empty() {
            continue;
        }

        let pass_stride = (xs.len() * bits_per_pixel).div_ceil(8);
        let mut pass = vec![0u8; pass_stride * ys.len()];

        for (py, &y) in ys.iter().enumerate() {
            let src = &raw[y * stride..(y + 1) * stride];
            let dst = &mut pass[py * pass_stride..(py + 1) * pass_stride];

            for (px, &x) in xs.iter().enumerate() {
                set_pixel_bits(dst, px, bits_per_pixel, &get_pixel_bits(src, x, bits_per_pixel));
            }
        }

        out.extend_from_slice(&filter_rows(&pass, pass_stride, bytes_per_pixel, filters));
    }

    out
}
