//! Thin FITS image container used for every exposure and master frame.
//!
//! Wraps the primary HDU of a 2D FITS image and exposes only what the
//! combiners need: dimensions, row and full-image reads as `f32`, full-image
//! writes and a handful of header keywords.

use std::fs;
use std::path::{Path, PathBuf};

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::headers::{ReadsKey, WritesKey};
use fitsio::images::{ImageDescription, ImageType};

use crate::error::{Error, Result};
use crate::image_size::ImageSize;

/// Header keyword holding the acquisition (or generation) timestamp.
pub const DATE_OBS_KEY: &str = "DATE-OBS";
/// Header keyword holding the exposure duration in seconds.
pub const EXPTIME_KEY: &str = "EXPTIME";

/// An open single-plane FITS image.
///
/// The underlying file handle is closed when the value is dropped.
pub struct FitsImage {
    path: PathBuf,
    fptr: FitsFile,
    hdu: FitsHdu,
    size: ImageSize,
}

impl std::fmt::Debug for FitsImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitsImage")
            .field("path", &self.path)
            .field("size", &self.size)
            .finish()
    }
}

impl FitsImage {
    /// Open an existing FITS file and read its dimensions from the primary HDU.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut fptr = FitsFile::open(path).map_err(|e| Error::fits(path, e))?;
        let hdu = fptr.primary_hdu().map_err(|e| Error::fits(path, e))?;

        let shape = match &hdu.info {
            HduInfo::ImageInfo { shape, .. } => shape.clone(),
            _ => Vec::new(),
        };

        // fitsio reports the shape as [NAXIS2, NAXIS1] = [height, width]
        let size = match shape.as_slice() {
            &[height, width] if height > 0 && width > 0 => ImageSize::new(width, height),
            _ => {
                return Err(Error::UnsupportedShape {
                    path: path.to_path_buf(),
                    shape,
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            fptr,
            hdu,
            size,
        })
    }

    /// Create a new 32-bit float image. A file already present at `path` is removed first.
    pub fn create<P: AsRef<Path>>(path: P, size: ImageSize) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
        }

        let dimensions = [size.height, size.width];
        let description = ImageDescription {
            data_type: ImageType::Float,
            dimensions: &dimensions,
        };

        let mut fptr = FitsFile::create(path)
            .with_custom_primary(&description)
            .open()
            .map_err(|e| Error::fits(path, e))?;
        let hdu = fptr.primary_hdu().map_err(|e| Error::fits(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            fptr,
            hdu,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Read one full row (`width` samples) into `buf`.
    ///
    /// # Panics
    /// Panics if `buf.len()` differs from the image width or `row` is out of range.
    pub fn read_row(&mut self, row: usize, buf: &mut [f32]) -> Result<()> {
        assert_eq!(buf.len(), self.size.width, "Row buffer length mismatch");
        assert!(row < self.size.height, "Row {row} out of range");

        let data: Vec<f32> = self
            .hdu
            .read_row(&mut self.fptr, row)
            .map_err(|e| Error::fits(&self.path, e))?;
        buf.copy_from_slice(&data[..self.size.width]);
        Ok(())
    }

    /// Read the whole image, row-major, as `f32`.
    pub fn read_image(&mut self) -> Result<Vec<f32>> {
        let data: Vec<f32> = self
            .hdu
            .read_image(&mut self.fptr)
            .map_err(|e| Error::fits(&self.path, e))?;
        debug_assert_eq!(data.len(), self.size.pixel_count());
        Ok(data)
    }

    /// Write the whole image, row-major.
    ///
    /// # Panics
    /// Panics if `data.len()` is not `width * height`.
    pub fn write_image(&mut self, data: &[f32]) -> Result<()> {
        assert_eq!(data.len(), self.size.pixel_count(), "Pixel count mismatch");
        self.hdu
            .write_image(&mut self.fptr, data)
            .map_err(|e| Error::fits(&self.path, e))
    }

    /// Write a header keyword with a comment.
    pub fn write_key<T>(&mut self, key: &str, value: T, comment: &str) -> Result<()>
    where
        for<'a> (T, &'a str): WritesKey,
    {
        self.hdu
            .write_key(&mut self.fptr, key, (value, comment))
            .map_err(|e| Error::fits(&self.path, e))
    }

    /// Read a header keyword.
    pub fn read_key<T: ReadsKey>(&mut self, key: &str) -> Result<T> {
        self.hdu
            .read_key(&mut self.fptr, key)
            .map_err(|e| Error::fits(&self.path, e))
    }

    /// Exposure duration in seconds, if the header carries a positive `EXPTIME`.
    pub fn exposure_time(&mut self) -> Option<f32> {
        self.read_key::<f32>(EXPTIME_KEY)
            .ok()
            .filter(|t| t.is_finite() && *t > 0.0)
    }

    /// Acquisition timestamp from `DATE-OBS`, if present.
    pub fn date_obs(&mut self) -> Option<String> {
        self.read_key::<String>(DATE_OBS_KEY).ok()
    }
}
