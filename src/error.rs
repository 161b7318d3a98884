//! Error types shared by the panel driver, the image pipeline and the slideshow.

use std::path::PathBuf;

use display_interface::DisplayError;
use thiserror::Error;

/// Main error type for all photo frame operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The controller kept its busy line asserted past the allowed wait.
    #[error("hardware timeout: busy signal did not clear within {waited_ms} ms")]
    HardwareTimeout {
        /// How long the driver polled before giving up.
        waited_ms: u64,
    },

    /// The panel did not come up during initialization.
    #[error("panel initialization failed: {0}")]
    InitializationFailure(String),

    /// A frame does not have exactly one byte per panel pixel.
    #[error("frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// `width * height` of the panel.
        expected: usize,
        /// Length of the offending buffer.
        actual: usize,
    },

    /// An operation was attempted while the driver was in the wrong state.
    #[error("{operation} is not allowed while the panel is {state}")]
    InvalidState {
        /// Name of the rejected operation.
        operation: &'static str,
        /// State the driver was in.
        state: &'static str,
    },

    /// A refresh rectangle is empty or extends past the panel.
    #[error("refresh area {w}x{h}+{x}+{y} does not fit the panel")]
    InvalidArea {
        /// Left edge.
        x: u16,
        /// Top edge.
        y: u16,
        /// Width.
        w: u16,
        /// Height.
        h: u16,
    },

    /// Bus or pin fault reported by the display interface.
    #[error("display interface error: {0:?}")]
    Interface(DisplayError),

    /// The source image could not be decoded.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The source image has a zero dimension.
    #[error("image has no pixels")]
    EmptyImage,

    /// A frame contains a byte outside the 16-level palette.
    #[error("pixel {index} has value {value}, which is not a palette level")]
    PaletteViolation {
        /// Offset of the pixel in the frame.
        index: usize,
        /// The offending value.
        value: u8,
    },

    /// A catalog record points at an artifact that is not on disk.
    #[error("prepared artifact missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The photo catalog failed to answer.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Pipeline/driver contract breaches. These point at a program defect rather
    /// than an operational condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::BufferSizeMismatch { .. } | Error::PaletteViolation { .. }
        )
    }
}

impl From<DisplayError> for Error {
    fn from(e: DisplayError) -> Self {
        Error::Interface(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => Error::Io(io),
            other => Error::UnsupportedFormat(other.to_string()),
        }
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
