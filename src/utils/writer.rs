use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Frame, RasterAnimation};

pub struct Writer {}

impl Writer {
    /// Writes an RGBA frame as a PAM (P7) file with an alpha channel.
    pub fn write_pam(output_path: &Path, frame: &Frame) -> Result<(), std::io::Error> {
        Writer::validate_pixel_count(frame)?;

        let mut file = BufWriter::new(File::create(output_path)?);

        file.write_all(b"P7\n")?;
        file.write_all(format!("WIDTH {}\n", frame.width()).as_bytes())?;
        file.write_all(format!("HEIGHT {}\n", frame.height()).as_bytes())?;
        file.write_all(b"DEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n")?;
        file.write_all(frame.pixels())?;
        file.flush()?;

        Ok(())
    }

    /// Writes a frame as a binary PPM (P6) file. Alpha is dropped.
    pub fn write_ppm(output_path: &Path, frame: &Frame) -> Result<(), std::io::Error> {
        Writer::validate_pixel_count(frame)?;

        let mut file = BufWriter::new(File::create(output_path)?);

        file.write_all(b"P6\n")?;
        file.write_all(format!("{} {}\n", frame.width(), frame.height()).as_bytes())?;
        file.write_all(b"255\n")?;
        file.write_all(&frame.as_rgb8())?;
        file.flush()?;

        Ok(())
    }

    /// Writes every frame next to `output_path`. A single-frame animation goes to
    /// `output_path` itself, otherwise frame `i` goes to `<stem>_frame_<i>.<ext>`.
    ///
    /// # Returns
    /// - The paths that were written
    pub fn write_frames(output_path: &Path, animation: &RasterAnimation) -> Result<Vec<PathBuf>, std::io::Error> {
        let extension = output_path.extension().and_then(|ext| ext.to_str()).unwrap_or("pam").to_string();
        let stem = output_path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("frame").to_string();
        let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));

        let mut written = Vec::with_capacity(animation.num_frames());

        for (i, frame) in animation.frames().iter().enumerate() {
            let path = if animation.num_frames() == 1 {
                output_path.to_path_buf()
            } else {
                output_dir.join(format!("{}_frame_{}.{}", stem, i, extension))
            };

            match extension.as_str() {
                "ppm" => Writer::write_ppm(&path, frame)?,
                _ => Writer::write_pam(&path, frame)?,
            }

            written.push(path);
        }

        Ok(written)
    }

    fn validate_pixel_count(frame: &Frame) -> Result<(), std::io::Error> {
        let expected_size = frame.width() as usize * frame.height() as usize * 4;
        let actual_size = frame.pixels().len();

        if expected_size != actual_size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "Invalid pixel data size for {}x{} frame: expected {} bytes, got {}",
                    frame.width(),
                    frame.height(),
                    expected_size,
                    actual_size
                ),
            ));
        }

        Ok(())
    }
}
