use serde::Serialize;

use crate::utils::image::Frame;

/// What happens to the canvas after a frame has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisposalMethod {
    None,
    Background,
    Previous,
}

/// How a frame's pixels are combined with the canvas (APNG `blend_op`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlendOp {
    Source,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// Composites `src` over `dst` with non-premultiplied alpha.
pub fn blend_over(dst: &mut [u8], src: &[u8]) {
    let src_a = src[3] as u32;

    if src_a == 255 {
        dst[..4].copy_from_slice(&src[..4]);
        return;
    }

    if src_a == 0 {
        return;
    }

    let dst_a = dst[3] as u32;

    // Both weights are scaled by 255 so the whole computation stays integral.
    let src_weight = src_a * 255;
    let dst_weight = dst_a * (255 - src_a);
    let out_weight = src_weight + dst_weight;

    for i in 0..3 {
        let value = src[i] as u32 * src_weight + dst[i] as u32 * dst_weight;
        dst[i] = ((value + out_weight / 2) / out_weight) as u8;
    }

    dst[3] = ((out_weight + 127) / 255) as u8;
}

/// The running canvas of one decode call.
///
/// Frames are drawn in order; each is snapshotted before its disposal is applied.
/// For `DisposalMethod::Previous` the canvas as it stood before the frame was
/// drawn is retained and restored afterwards, so a run of consecutive "previous"
/// frames always falls back to the last stable state.
pub struct Compositor {
    width: u32,
    height: u32,
    canvas: Vec<u8>,
    restore_point: Option<Vec<u8>>,
    frames: Vec<Frame>,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Compositor {
            width,
            height,
            canvas: vec![0; width as usize * height as usize * 4],
            restore_point: None,
            frames: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut [u8] {
        &mut self.canvas
    }

    /// Intersects `rect` with the canvas bounds.
    pub fn clip(&self, rect: Rect) -> Rect {
        let x = rect.x.min(self.width);
        let y = rect.y.min(self.height);

        Rect {
            x,
            y,
            width: rect.right().min(self.width) - x,
            height: rect.bottom().min(self.height) - y,
        }
    }

    /// Byte offset of pixel `(x, y)` in the canvas.
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Draws one frame and records it.
    ///
    /// # Parameters
    /// - `rect`: region the frame occupies, used by `DisposalMethod::Background`
    /// - `disposal`: applied after the snapshot is taken
    /// - `delay`: display time in milliseconds
    /// - `draw`: paints the frame onto the canvas
    pub fn compose<F>(&mut self, rect: Rect, disposal: DisposalMethod, delay: u32, draw: F)
    where
        F: FnOnce(&mut Compositor),
    {
        if disposal == DisposalMethod::Previous {
            self.restore_point = Some(self.canvas.clone());
        }

        draw(self);

        self.frames.push(Frame::new(self.width, self.height, self.canvas.clone(), delay));

        match disposal {
            DisposalMethod::None => {}
            DisposalMethod::Background => self.clear_rect(rect),
            DisposalMethod::Previous => {
                if let Some(previous) = self.restore_point.take() {
                    self.canvas = previous;
                }
            }
        }
    }

    /// Resets `rect` to fully transparent.
    pub fn clear_rect(&mut self, rect: Rect) {
        let rect = self.clip(rect);

        for y in rect.y..rect.bottom() {
            let start = self.offset(rect.x, y);
            let end = start + rect.width as usize * 4;
            self.canvas[start..end].fill(0);
        }
    }

    /// Copies or blends an RGBA8 block of `rect.width * rect.height` pixels onto
    /// the canvas at the rect's position. Pixels outside the canvas are dropped.
    pub fn draw_rgba(&mut self, rect: Rect, pixels: &[u8], blend: BlendOp) {
        let clipped = self.clip(rect);
        let src_stride = rect.width as usize * 4;

        for y in clipped.y..clipped.bottom() {
            let src_row = (y - rect.y) as usize * src_stride;
            let src_start = src_row + (clipped.x - rect.x) as usize * 4;
            let len = clipped.width as usize * 4;

            let Some(src) = pixels.get(src_start..src_start + len) else {
                break;
            };

            let dst_start = self.offset(clipped.x, y);
            let dst = &mut self.canvas[dst_start..dst_start + len];

            match blend {
                BlendOp::Source => dst.copy_from_slice(src),
                BlendOp::Over => {
                    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                        blend_over(d, s);
                    }
                }
            }
        }
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}
