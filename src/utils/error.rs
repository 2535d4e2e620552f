use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

#[derive(Debug)]
pub enum AnimaError {
    IoError(io::Error),
    UnsupportedFormat(String),
    InvalidDimensions { width: u32, height: u32 },
    /// Structural violation: the byte at `offset` did not match what the format requires.
    Format { offset: usize, expected: String },
    UnexpectedEof { offset: usize, needed: usize },
    /// Decoded pixel data length differs from the frame size (strict mode only).
    /// `actual` is `None` when the stream held more data than the frame.
    DataLength { frame: usize, expected: usize, actual: Option<usize> },
    Decompression(String),
    Custom(String),
}

impl AnimaError {
    pub(crate) fn format(offset: usize, expected: impl Into<String>) -> AnimaError {
        AnimaError::Format {
            offset,
            expected: expected.into(),
        }
    }
}

impl Error for AnimaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnimaError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for AnimaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AnimaError::IoError(err) => write!(f, "I/O error: {}", err),
            AnimaError::UnsupportedFormat(format) => write!(f, "Unsupported image format: {}", format),
            AnimaError::InvalidDimensions { width, height } => {
                write!(f, "Invalid image dimensions: {}x{}", width, height)
            }
            AnimaError::Format { offset, expected } => {
                write!(f, "Format error at offset {:#x}: expected {}", offset, expected)
            }
            AnimaError::UnexpectedEof { offset, needed } => {
                write!(f, "Unexpected end of data at offset {:#x}: {} more bytes needed", offset, needed)
            }
            AnimaError::DataLength { frame, expected, actual: Some(actual) } => {
                write!(f, "Frame {}: expected {} pixels, decoded {}", frame, expected, actual)
            }
            AnimaError::DataLength { frame, expected, actual: None } => {
                write!(f, "Frame {}: pixel data exceeds {} pixels", frame, expected)
            }
            AnimaError::Decompression(msg) => write!(f, "Decompression error: {}", msg),
            AnimaError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<io::Error> for AnimaError {
    fn from(error: io::Error) -> Self {
        AnimaError::IoError(error)
    }
}

// Result type alias for Anima operations
pub type AnimaResult<T> = Result<T, AnimaError>;
