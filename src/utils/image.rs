use serde::Serialize;

fn swap_red_blue(mut pixels: Vec<u8>) -> Vec<u8> {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    pixels
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageFormat {
    Gif,
    Png,
    Unknown,
}

/// Fully decoded animation: every frame is a composited canvas of the full
/// animation size.
#[derive(Debug, Clone)]
pub struct RasterAnimation {
    width: u32,
    height: u32,
    frames: Vec<Frame>,
    loop_count: Option<u32>,
}

impl RasterAnimation {
    pub fn new(width: u32, height: u32, frames: Vec<Frame>, loop_count: Option<u32>) -> RasterAnimation {
        RasterAnimation {
            width,
            height,
            frames,
            loop_count,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of times the animation should play, as stored by the source format.
    /// `Some(0)` means infinite, `None` means the file carries no loop information.
    pub fn loop_count(&self) -> Option<u32> {
        self.loop_count
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Sum of all frame delays in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.frames.iter().map(|frame| frame.delay() as u64).sum()
    }

    /// Returns the first frame's pixels as RGBA8 bytes
    pub fn pixels(&self) -> &[u8] {
        self.frames.first().map(|frame| frame.pixels()).unwrap_or(&[])
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Converts every frame to BGRA8 channel order, consuming the animation.
    pub fn into_bgra8(self) -> RasterAnimation {
        let frames = self.frames.into_iter().map(|frame| frame.into_bgra8()).collect();

        RasterAnimation::new(self.width, self.height, frames, self.loop_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    delay: u32,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, delay: u32) -> Frame {
        Frame {
            width,
            height,
            pixels,
            delay,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixels, `width * height * 4` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Display time in milliseconds.
    pub fn delay(&self) -> u32 {
        self.delay
    }

    /// Returns the RGBA8 value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let start = (y as usize * self.width as usize + x as usize) * 4;
        let pixel = self.pixels.get(start..start + 4)?;

        Some([pixel[0], pixel[1], pixel[2], pixel[3]])
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn into_bgra8(self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            pixels: swap_red_blue(self.pixels),
            delay: self.delay,
        }
    }

    pub fn as_bgra8(&self) -> Vec<u8> {
        swap_red_blue(self.pixels.clone())
    }

    pub fn as_rgb8(&self) -> Vec<u8> {
        self.pixels.chunks_exact(4).flat_map(|pixel| [pixel[0], pixel[1], pixel[2]]).collect()
    }
}
