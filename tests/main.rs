mod common;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    use crate::common::{build_gif, filter_rows, zlib, GifFrame, PngBuilder};
    use anima::bytereader::{ByteReader, Span};
    use anima::writer::Writer;
    use anima::{
        Anima, AnimaError, BlendOp, Compositor, DecodeOptions, DisposalMethod, Frame, ImageFormat, RasterAnimation,
        Rect,
    };

    fn small_gif() -> Vec<u8> {
        let frames = [
            GifFrame::new(0, 0, 2, 1, vec![0, 1]).with_control(0, 10, None),
            GifFrame::new(1, 0, 1, 1, vec![0]).with_control(0, 10, None),
        ];

        build_gif(2, 1, &[[0, 0, 0], [255, 255, 255]], Some(0), &frames)
    }

    fn small_png() -> Vec<u8> {
        let raw = [10, 20, 30, 255, 40, 50, 60, 128];

        PngBuilder::new()
            .ihdr(2, 1, 8, 6, 0)
            .chunk(b"IDAT", &zlib(&filter_rows(&raw, 8, 4, &[1])))
            .finish()
    }

    fn scratch_dir(name: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dir = std::env::temp_dir().join(format!("anima_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    #[test]
    pub fn test_bytereader() -> Result<(), Box<dyn std::error::Error>> {
        let data = [0x01, 0x34, 0x12, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0x02, 0xAA, 0xBB, 0x00, 0x07];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_u8()?, 0x01);
        assert_eq!(reader.read_u16_le()?, 0x1234);
        assert_eq!(reader.read_u16_be()?, 0x1234);
        assert_eq!(reader.read_u32_be()?, 0xDEADBEEF);
        assert_eq!(reader.position(), 9);

        assert_eq!(reader.peek_slice(2), Some(&[0x02, 0xAA][..]));

        let span = reader.skip_sub_blocks()?;
        assert_eq!(span, Span::new(9, 4));
        assert_eq!(span.slice(&data), [0x02, 0xAA, 0xBB, 0x00]);

        assert_eq!(reader.remaining(), 1);
        assert!(reader.peek_slice(2).is_none());

        match reader.read_u16_be() {
            Err(AnimaError::UnexpectedEof { offset, needed }) => {
                assert_eq!(offset, 13);
                assert_eq!(needed, 1);
            }
            other => panic!("expected end of data, got {:?}", other),
        }

        assert_eq!(reader.read_slice(1)?, [0x07]);
        assert!(reader.is_eof());

        // A span outside the buffer resolves to nothing
        assert!(Span::new(10, 50).slice(&data).is_empty());

        Ok(())
    }

    #[test]
    pub fn test_format_detection() -> Result<(), Box<dyn std::error::Error>> {
        let gif = Anima::new(Cursor::new(small_gif()))?;
        assert_eq!(gif.get_format(), ImageFormat::Gif);
        assert_eq!(gif.decode()?.num_frames(), 2);

        let png = Anima::from_bytes(small_png());
        assert_eq!(png.get_format(), ImageFormat::Png);
        assert_eq!(png.decode()?.num_frames(), 1);

        let unknown = Anima::from_bytes(b"BM\x00\x00\x00\x00".to_vec());
        assert_eq!(unknown.get_format(), ImageFormat::Unknown);
        assert!(matches!(unknown.decode(), Err(AnimaError::UnsupportedFormat(_))));
        assert!(matches!(unknown.get_info(), Err(AnimaError::UnsupportedFormat(_))));

        assert!(matches!(
            anima::decode(b"BM\x00\x00"),
            Err(AnimaError::Format { offset: 0, .. })
        ));
        assert!(matches!(anima::decode(&[]), Err(AnimaError::Format { offset: 0, .. })));

        Ok(())
    }

    #[test]
    pub fn test_malformed_gif_signature_same_from_both_entry_points() -> Result<(), Box<dyn std::error::Error>> {
        let mut data = small_gif();
        data[4] = b'8';

        let front_end = Anima::from_bytes(data.clone());
        assert_eq!(front_end.get_format(), ImageFormat::Gif);
        assert!(matches!(front_end.decode(), Err(AnimaError::Format { offset: 0, .. })));
        assert!(matches!(front_end.get_info(), Err(AnimaError::Format { offset: 0, .. })));

        assert!(matches!(anima::decode(&data), Err(AnimaError::Format { offset: 0, .. })));

        Ok(())
    }

    #[test]
    pub fn test_open_missing_file() -> Result<(), Box<dyn std::error::Error>> {
        let result = Anima::open("./tests/does_not_exist.gif");
        assert!(matches!(result, Err(AnimaError::IoError(_))));

        Ok(())
    }

    #[test]
    pub fn test_decode_options() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(DecodeOptions::lenient(), DecodeOptions::default());

        let strict = DecodeOptions::strict();
        assert!(strict.verify_crc && strict.strict_lzw && strict.strict_inflate);

        let options = DecodeOptions::lenient().with_strict_lzw(true).with_verify_crc(true);
        assert!(options.strict_lzw);
        assert!(options.verify_crc);
        assert!(!options.strict_inflate);
        assert_eq!(options.with_strict_inflate(true), DecodeOptions::strict());

        // A well-formed file decodes the same either way
        let data = small_png();
        let lenient = anima::decode(&data)?;
        let strict = Anima::from_bytes(data).with_options(DecodeOptions::strict()).decode()?;
        assert_eq!(lenient.frames(), strict.frames());

        Ok(())
    }

    #[test]
    pub fn test_compositor_draw_and_clip() -> Result<(), Box<dyn std::error::Error>> {
        let mut compositor = Compositor::new(2, 2);

        let rect = Rect::new(1, 1, 2, 2);
        assert_eq!((rect.right(), rect.bottom()), (3, 3));
        assert_eq!(compositor.clip(rect), Rect::new(1, 1, 1, 1));
        assert_eq!(compositor.clip(Rect::new(5, 0, 1, 1)).width, 0);

        let block = [1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255, 4, 4, 4, 255];
        compositor.draw_rgba(rect, &block, BlendOp::Source);

        assert_eq!(compositor.offset(1, 1), 12);
        assert_eq!(&compositor.canvas()[12..16], [1, 1, 1, 255]);
        assert_eq!(&compositor.canvas()[..12], [0; 12]);

        compositor.canvas_mut()[0..4].copy_from_slice(&[255, 0, 0, 255]);
        compositor.draw_rgba(Rect::new(0, 0, 1, 1), &[0, 0, 255, 128], BlendOp::Over);
        assert_eq!(&compositor.canvas()[0..4], [127, 0, 128, 255]);

        // Half-transparent source over an empty canvas keeps its own color
        compositor.draw_rgba(Rect::new(1, 0, 1, 1), &[0, 0, 255, 128], BlendOp::Over);
        assert_eq!(&compositor.canvas()[4..8], [0, 0, 255, 128]);

        // A fully transparent source leaves the canvas alone
        compositor.draw_rgba(Rect::new(1, 0, 1, 1), &[9, 9, 9, 0], BlendOp::Over);
        assert_eq!(&compositor.canvas()[4..8], [0, 0, 255, 128]);

        Ok(())
    }

    #[test]
    pub fn test_compositor_disposal() -> Result<(), Box<dyn std::error::Error>> {
        let red = [255, 0, 0, 255];
        let green = [0, 255, 0, 255];
        let mut compositor = Compositor::new(1, 1);

        compositor.compose(Rect::new(0, 0, 1, 1), DisposalMethod::None, 10, |canvas| {
            canvas.draw_rgba(Rect::new(0, 0, 1, 1), &red, BlendOp::Source)
        });
        compositor.compose(Rect::new(0, 0, 1, 1), DisposalMethod::Previous, 20, |canvas| {
            canvas.draw_rgba(Rect::new(0, 0, 1, 1), &green, BlendOp::Source)
        });
        assert_eq!(compositor.canvas(), red);

        compositor.compose(Rect::new(0, 0, 1, 1), DisposalMethod::Background, 30, |_| {});
        assert_eq!(compositor.canvas(), [0, 0, 0, 0]);

        let frames = compositor.into_frames();
        let delays: Vec<u32> = frames.iter().map(|frame| frame.delay()).collect();

        assert_eq!(delays, [10, 20, 30]);
        assert_eq!(frames[1].pixels(), green);
        assert_eq!(frames[2].pixels(), red);

        Ok(())
    }

    #[test]
    pub fn test_frame_accessors() -> Result<(), Box<dyn std::error::Error>> {
        let frame = Frame::new(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8], 40);

        assert_eq!(frame.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.pixel(0, 1), None);
        assert_eq!(frame.as_rgb8(), [1, 2, 3, 5, 6, 7]);
        assert_eq!(frame.as_bgra8(), [3, 2, 1, 4, 7, 6, 5, 8]);

        let animation = RasterAnimation::new(2, 1, vec![frame.clone(), frame], Some(2));
        assert_eq!(animation.duration_ms(), 80);

        let bgra = animation.into_bgra8();
        assert_eq!(bgra.loop_count(), Some(2));
        assert!(bgra.frames().iter().all(|frame| frame.pixels() == [3, 2, 1, 4, 7, 6, 5, 8]));

        let pixels = bgra.into_frames().remove(0).into_pixels();
        assert_eq!(pixels.len(), 8);

        Ok(())
    }

    #[test]
    pub fn test_write_pam() -> Result<(), Box<dyn std::error::Error>> {
        let dir = scratch_dir("pam")?;
        let animation = anima::decode(&small_png())?;

        let written = Writer::write_frames(&dir.join("still.pam"), &animation)?;
        assert_eq!(written, vec![dir.join("still.pam")]);

        let mut expected = b"P7\nWIDTH 2\nHEIGHT 1\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n".to_vec();
        expected.extend_from_slice(&[10, 20, 30, 255, 40, 50, 60, 128]);
        assert_eq!(fs::read(&written[0])?, expected);

        fs::remove_dir_all(&dir)?;

        Ok(())
    }

    #[test]
    pub fn test_write_ppm_frames() -> Result<(), Box<dyn std::error::Error>> {
        let dir = scratch_dir("ppm")?;
        let animation = anima::decode(&small_gif())?;

        let written = Writer::write_frames(&dir.join("anim.ppm"), &animation)?;
        assert_eq!(written, vec![dir.join("anim_frame_0.ppm"), dir.join("anim_frame_1.ppm")]);

        let mut expected = b"P6\n2 1\n255\n".to_vec();
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        assert_eq!(fs::read(&written[1])?, expected);

        let broken = Frame::new(2, 2, vec![0; 4], 0);
        let error = Writer::write_pam(&dir.join("broken.pam"), &broken).err().ok_or("expected an error")?;
        assert_eq!(error.kind(), std::io::ErrorKind::InvalidInput);

        fs::remove_dir_all(&dir)?;

        Ok(())
    }

    #[test]
    pub fn test_info_serializes_to_json() -> Result<(), Box<dyn std::error::Error>> {
        let info = Anima::from_bytes(small_gif()).get_info()?;
        let value = serde_json::to_value(&info)?;

        assert_eq!(value["Gif"]["version"], "89a");
        assert_eq!(value["Gif"]["width"], 2);
        assert_eq!(value["Gif"]["loop_count"], 0);
        assert_eq!(value["Gif"]["frames"].as_array().map(|frames| frames.len()), Some(2));
        assert_eq!(value["Gif"]["frames"][1]["rect"]["x"], 1);
        assert_eq!(value["Gif"]["frames"][1]["delay"], 10);

        let info = Anima::from_bytes(small_png()).get_info()?;
        let value = serde_json::to_value(&info)?;

        assert_eq!(value["Png"]["header"]["color_type"], "RGBA");
        assert_eq!(value["Png"]["header"]["bit_depth"], 8);
        assert!(value["Png"]["header"].get("layout").is_none());
        assert!(value["Png"]["actl_info"].is_null());

        Ok(())
    }
}
