mod decoders;
mod utils;

use crate::decoders::gif::GifDecoder;
use crate::decoders::png::{PngDecoder, PNG_SIGNATURE};

pub use decoders::{gif, lzw, png, scanline};
pub use utils::compose::{BlendOp, Compositor, DisposalMethod, Rect};
pub use utils::error::{AnimaError, AnimaResult};
pub use utils::image::{Frame, ImageFormat, RasterAnimation};
pub use utils::info::{GifInfo, ImageInfo, PngInfo};
pub use utils::logger::{LogLevel, Logger};
pub use utils::options::DecodeOptions;
pub use utils::{bytereader, writer};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decoder front end: holds the complete encoded file and dispatches to the
/// GIF or PNG decoder by sniffing the leading bytes.
pub struct Anima {
    data: Vec<u8>,
    format: ImageFormat,
    options: DecodeOptions,
}

impl Anima {
    pub fn open<P: AsRef<Path>>(path: P) -> AnimaResult<Anima> {
        let file = File::open(path)?;
        Anima::new(BufReader::new(file))
    }

    /// Reads `reader` to the end and sniffs the format.
    pub fn new<R: Read>(mut reader: R) -> AnimaResult<Anima> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        Ok(Anima::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Anima {
        let format = try_guess_format(&data);

        Anima {
            data,
            format,
            options: DecodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Anima {
        self.options = options;
        self
    }

    pub fn decode(&self) -> AnimaResult<RasterAnimation> {
        match self.format {
            ImageFormat::Gif => GifDecoder::new(&self.data).with_options(self.options).decode(),
            ImageFormat::Png => PngDecoder::new(&self.data).with_options(self.options).decode(),
            ImageFormat::Unknown => Err(AnimaError::UnsupportedFormat("Unknown format".to_string())),
        }
    }

    pub fn get_format(&self) -> ImageFormat {
        self.format
    }

    /// Parses the container without decoding pixels and returns its metadata.
    pub fn get_info(&self) -> AnimaResult<ImageInfo> {
        match self.format {
            ImageFormat::Gif => {
                let mut gif_decoder = GifDecoder::new(&self.data).with_options(self.options);
                gif_decoder.parse()?;

                Ok(ImageInfo::Gif(gif_decoder.get_info()))
            }
            ImageFormat::Png => {
                let mut png_decoder = PngDecoder::new(&self.data).with_options(self.options);
                png_decoder.parse()?;

                Ok(ImageInfo::Png(png_decoder.get_info()))
            }
            ImageFormat::Unknown => Err(AnimaError::UnsupportedFormat("Unknown format".to_string())),
        }
    }
}

/// Decodes a complete GIF or PNG/APNG file with lenient options.
pub fn decode(data: &[u8]) -> AnimaResult<RasterAnimation> {
    decode_with_options(data, &DecodeOptions::default())
}

pub fn decode_with_options(data: &[u8], options: &DecodeOptions) -> AnimaResult<RasterAnimation> {
    match try_guess_format(data) {
        ImageFormat::Gif => GifDecoder::new(data).with_options(*options).decode(),
        ImageFormat::Png => PngDecoder::new(data).with_options(*options).decode(),
        ImageFormat::Unknown => Err(AnimaError::format(0, "GIF or PNG signature")),
    }
}

/// Picks the decoder from the leading bytes. Anything starting with `GIF8` goes to
/// the GIF parser, which validates the rest of the signature.
fn try_guess_format(header: &[u8]) -> ImageFormat {
    if header.starts_with(&PNG_SIGNATURE) {
        return ImageFormat::Png;
    }

    if header.starts_with(b"GIF8") {
        return ImageFormat::Gif;
    }

    ImageFormat::Unknown
}
