//! Error types for calibration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::calibration_masters::MasterRole;
use crate::image_size::ImageSize;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading exposures or building master frames.
#[derive(Debug, Error)]
pub enum Error {
    #[error("FITS operation failed on '{path}': {source}")]
    Fits {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Not enough frames in '{dir}' with prefix '{prefix}': found {found}, need at least {required}"
    )]
    NotEnoughFrames {
        dir: PathBuf,
        prefix: String,
        found: usize,
        required: usize,
    },

    #[error("Dimension mismatch for {role} master: expected {expected}, got {actual}")]
    DimensionMismatch {
        role: MasterRole,
        expected: ImageSize,
        actual: ImageSize,
    },

    #[error("Bias master is {bias} but the {role} frames are {frames}")]
    BiasSizeMismatch {
        role: MasterRole,
        bias: ImageSize,
        frames: ImageSize,
    },

    #[error("Unsupported image shape {shape:?} in '{path}', expected a 2D image")]
    UnsupportedShape { path: PathBuf, shape: Vec<usize> },

    #[error("A dark master is held but the frame has no positive exposure time")]
    MissingExposureTime,

    #[error("Normalization scale {scale} of '{path}' is not usable")]
    DegenerateScale { path: PathBuf, scale: f32 },

    #[error("Result directory '{path}' must differ from the image directory")]
    SameDirectory { path: PathBuf },

    #[error("Failed to parse config '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn fits(path: impl Into<PathBuf>, source: fitsio::errors::Error) -> Self {
        Self::Fits {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_enough_frames_message() {
        let err = Error::NotEnoughFrames {
            dir: PathBuf::from("/data/bias"),
            prefix: "bias_".to_string(),
            found: 2,
            required: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/bias"));
        assert!(msg.contains("bias_"));
        assert!(msg.contains("found 2"));
        assert!(msg.contains("at least 3"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = Error::DimensionMismatch {
            role: MasterRole::Flat,
            expected: ImageSize::new(100, 100),
            actual: ImageSize::new(200, 100),
        };
        let msg = err.to_string();
        assert!(msg.contains("flat"));
        assert!(msg.contains("100x100"));
        assert!(msg.contains("200x100"));
    }

    #[test]
    fn test_bias_size_mismatch_message() {
        let err = Error::BiasSizeMismatch {
            role: MasterRole::Dark,
            bias: ImageSize::new(10, 10),
            frames: ImageSize::new(20, 20),
        };
        let msg = err.to_string();
        assert!(msg.contains("dark"));
        assert!(msg.contains("10x10"));
        assert!(msg.contains("20x20"));
    }

    #[test]
    fn test_io_error_source_chain() {
        use std::error::Error as StdError;

        let err = Error::io(
            "/missing/dir",
            io::Error::new(io::ErrorKind::NotFound, "underlying error"),
        );

        assert!(err.to_string().contains("/missing/dir"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_is_debug() {
        let err = Error::SameDirectory {
            path: PathBuf::from("/tmp"),
        };
        assert!(format!("{:?}", err).contains("SameDirectory"));
    }
}
