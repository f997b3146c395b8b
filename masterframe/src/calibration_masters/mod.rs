//! Master calibration frame creation and management.


use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use common::file_utils::{files_with_prefix, is_fits_file};
use strum_macros::Display;

use crate::combine::{ClipStats, minmax_clip, sigma_clip_with_stats};
use crate::config::CombineConfig;
use crate::error::{Error, Result};
use crate::fits::{DATE_OBS_KEY, EXPTIME_KEY, FitsImage};
use crate::frame_set::load_frame_set;
use crate::image_size::ImageSize;
use crate::math::statistics::sample_median;
use crate::outlier_filter::remove_noise;

/// Exposure time written into dark and flat masters, which are normalized to unit exposure.
const UNIT_EXPOSURE: f32 = 1.0;

/// Timestamp layout of the `DATE-OBS` keyword.
const DATE_OBS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Calibration category of a master frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MasterRole {
    Zero,
    Dark,
    Flat,
}

impl MasterRole {
    pub const ALL: [MasterRole; 3] = [MasterRole::Zero, MasterRole::Dark, MasterRole::Flat];

    /// File name of the master written into the source directory.
    pub fn file_name(self) -> &'static str {
        match self {
            MasterRole::Zero => "ZERO.fit",
            MasterRole::Dark => "DARK.fit",
            MasterRole::Flat => "FLAT.fit",
        }
    }
}

/// Combined (or loaded) master image held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterFrame {
    size: ImageSize,
    pixels: Vec<f32>,
}

impl MasterFrame {
    /// # Panics
    /// Panics if `pixels.len()` is not `size.pixel_count()`.
    pub fn new(size: ImageSize, pixels: Vec<f32>) -> Self {
        assert_eq!(pixels.len(), size.pixel_count(), "Pixel count mismatch");
        Self { size, pixels }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Row `row` of the master.
    fn row(&self, row: usize) -> &[f32] {
        let width = self.size.width;
        &self.pixels[row * width..(row + 1) * width]
    }
}

/// Snapshot of which masters are held and the dimensions they share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationState {
    pub valid_zero: bool,
    pub valid_dark: bool,
    pub valid_flat: bool,
    /// Dimensions shared by every held master, `None` before the first one.
    pub size: Option<ImageSize>,
}

impl CalibrationState {
    pub fn is_valid(&self, role: MasterRole) -> bool {
        match role {
            MasterRole::Zero => self.valid_zero,
            MasterRole::Dark => self.valid_dark,
            MasterRole::Flat => self.valid_flat,
        }
    }

    pub fn pixels(&self) -> usize {
        self.size.map_or(0, |s| s.pixel_count())
    }
}

/// Builds, loads and applies master bias, dark and flat frames.
///
/// Every held master has the tracked size. Installing a master of another size
/// adopts that size and drops the other masters. A failing operation leaves
/// every master untouched.
#[derive(Debug, Default)]
pub struct CalibrationCombiner {
    config: CombineConfig,
    zero: Option<MasterFrame>,
    dark: Option<MasterFrame>,
    flat: Option<MasterFrame>,
    size: Option<ImageSize>,
}

impl CalibrationCombiner {
    pub fn new(config: CombineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &CombineConfig {
        &self.config
    }

    pub fn state(&self) -> CalibrationState {
        CalibrationState {
            valid_zero: self.zero.is_some(),
            valid_dark: self.dark.is_some(),
            valid_flat: self.flat.is_some(),
            size: self.size,
        }
    }

    pub fn master(&self, role: MasterRole) -> Option<&MasterFrame> {
        self.slot(role).as_ref()
    }

    /// Combine bias frames with a min-max clipped mean and write `ZERO.fit` into `dir`.
    pub fn combine_zero<P: AsRef<Path>>(&mut self, dir: P, prefix: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let mut batch = load_frame_set(dir, prefix)?;
        let size = batch.size();

        tracing::info!("Combining {} bias frames ({})", batch.len(), size);
        let pixels = batch.combine_rows(|_, _, _| {}, minmax_clip)?;
        drop(batch);

        let path = write_master(dir, MasterRole::Zero, size, &pixels, None)?;
        self.install(MasterRole::Zero, MasterFrame::new(size, pixels));
        Ok(path)
    }

    /// Load an existing bias master.
    pub fn set_zero<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.load_master(MasterRole::Zero, path.as_ref())
    }

    /// Combine dark frames into a dark-current-per-second master and write `DARK.fit` into `dir`.
    ///
    /// Frames without a positive `EXPTIME` are dropped. Each sample is bias
    /// subtracted (when a bias master is held), divided by its frame's exposure
    /// time and combined with a min-max clipped mean.
    pub fn combine_dark<P: AsRef<Path>>(&mut self, dir: P, prefix: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let mut batch = load_frame_set(dir, prefix)?;
        let size = batch.size();
        let bias = self.bias_for(MasterRole::Dark, size)?;

        let mut exposures = Vec::with_capacity(batch.len());
        batch.retain_mut(|frame| match frame.exposure_time() {
            Some(exposure) => {
                exposures.push(exposure);
                true
            }
            None => {
                tracing::warn!("Dropping {}: no exposure time", frame.path().display());
                false
            }
        });
        batch.ensure_min_frames()?;

        tracing::info!(
            "Combining {} dark frames ({}), bias {}",
            batch.len(),
            size,
            if bias.is_some() { "subtracted" } else { "not available" }
        );
        let pixels = batch.combine_rows(
            |index, row, samples| {
                if let Some(bias) = bias {
                    subtract_row(samples, bias.row(row));
                }
                let exposure = exposures[index];
                for s in samples.iter_mut() {
                    *s /= exposure;
                }
            },
            minmax_clip,
        )?;
        drop(batch);

        let path = write_master(dir, MasterRole::Dark, size, &pixels, Some(UNIT_EXPOSURE))?;
        self.install(MasterRole::Dark, MasterFrame::new(size, pixels));
        Ok(path)
    }

    /// Load an existing dark master.
    pub fn set_dark<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.load_master(MasterRole::Dark, path.as_ref())
    }

    /// Combine flat frames with average sigma clipping and write `FLAT.fit` into `dir`.
    ///
    /// Each frame's scale is the sampled median of its raw pixels. Samples are
    /// bias subtracted (when a bias master is held) and then divided by that scale.
    pub fn combine_flat<P: AsRef<Path>>(&mut self, dir: P, prefix: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let mut batch = load_frame_set(dir, prefix)?;
        let size = batch.size();
        let bias = self.bias_for(MasterRole::Flat, size)?;

        let mut scales = Vec::with_capacity(batch.len());
        for frame in batch.frames_mut() {
            let data = frame.read_image()?;
            let scale = sample_median(&data);
            if !scale.is_finite() || scale == 0.0 {
                return Err(Error::DegenerateScale {
                    path: frame.path().to_path_buf(),
                    scale,
                });
            }
            tracing::debug!("Flat {} scale {}", frame.path().display(), scale);
            scales.push(scale);
        }

        tracing::info!(
            "Combining {} flat frames ({}), bias {}",
            batch.len(),
            size,
            if bias.is_some() { "subtracted" } else { "not available" }
        );

        let clip = self.config.flat_clip;
        let frame_count = batch.len();
        let mut stats = ClipStats::default();
        let mut pixels = batch.combine_rows(
            |index, row, samples| {
                if let Some(bias) = bias {
                    subtract_row(samples, bias.row(row));
                }
                let scale = scales[index];
                for s in samples.iter_mut() {
                    *s /= scale;
                }
            },
            |samples| {
                let outcome = sigma_clip_with_stats(samples, clip);
                stats.record(samples.len(), &outcome);
                outcome.value
            },
        )?;
        drop(batch);
        stats.log_summary(frame_count);

        if self.config.remove_flat_noise {
            remove_noise(&mut pixels, size, self.config.outlier_sigma);
        }

        let path = write_master(dir, MasterRole::Flat, size, &pixels, Some(UNIT_EXPOSURE))?;
        self.install(MasterRole::Flat, MasterFrame::new(size, pixels));
        Ok(path)
    }

    /// Load an existing flat master.
    pub fn set_flat<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.load_master(MasterRole::Flat, path.as_ref())
    }

    /// Discard the master of `role`. Other masters and the tracked size are kept.
    pub fn reset(&mut self, role: MasterRole) {
        if self.slot_mut(role).take().is_some() {
            tracing::debug!("Discarded {} master", role);
        }
    }

    /// Calibrate a science frame in place.
    ///
    /// Applies, for each held master in order: subtract bias, subtract
    /// `dark * exposure`, divide by flat. Pixels where the flat is not above
    /// `f32::EPSILON` are left undivided.
    ///
    /// # Panics
    /// Panics if `pixels.len()` is not `size.pixel_count()`.
    pub fn calibrate(
        &self,
        pixels: &mut [f32],
        size: ImageSize,
        exposure: Option<f32>,
    ) -> Result<()> {
        assert_eq!(pixels.len(), size.pixel_count(), "Pixel count mismatch");

        for role in MasterRole::ALL {
            if let Some(master) = self.slot(role)
                && master.size != size
            {
                return Err(Error::DimensionMismatch {
                    role,
                    expected: master.size,
                    actual: size,
                });
            }
        }

        let dark = match (&self.dark, exposure) {
            (Some(dark), Some(exposure)) => Some((dark, exposure)),
            (Some(_), None) => return Err(Error::MissingExposureTime),
            (None, _) => None,
        };

        if let Some(bias) = &self.zero {
            subtract_row(pixels, &bias.pixels);
        }

        if let Some((dark, exposure)) = dark {
            for (p, d) in pixels.iter_mut().zip(&dark.pixels) {
                *p -= d * exposure;
            }
        }

        if let Some(flat) = &self.flat {
            for (p, &f) in pixels.iter_mut().zip(&flat.pixels) {
                if f > f32::EPSILON {
                    *p /= f;
                }
            }
        }

        Ok(())
    }

    /// Calibrate every FITS file (by extension) in `image_dir` whose name starts with `prefix`.
    ///
    /// Results are written under the same file name into `result_dir`, which
    /// must differ from `image_dir`, carrying over `DATE-OBS` and `EXPTIME`.
    /// Files that cannot be read or calibrated are skipped with a warning.
    /// Returns the paths written.
    pub fn calibrate_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        image_dir: P,
        prefix: &str,
        result_dir: Q,
    ) -> Result<Vec<PathBuf>> {
        let image_dir = image_dir.as_ref();
        let result_dir = result_dir.as_ref();

        if same_directory(image_dir, result_dir) {
            return Err(Error::SameDirectory {
                path: result_dir.to_path_buf(),
            });
        }

        let candidates: Vec<PathBuf> = files_with_prefix(image_dir, prefix)
            .map_err(|e| Error::io(image_dir, e))?
            .into_iter()
            .filter(|path| is_fits_file(path))
            .collect();
        fs::create_dir_all(result_dir).map_err(|e| Error::io(result_dir, e))?;

        let mut written = Vec::with_capacity(candidates.len());
        for path in &candidates {
            match self.calibrate_file(path, result_dir) {
                Ok(output) => written.push(output),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        tracing::info!(
            "Calibrated {} of {} frames from {} into {}",
            written.len(),
            candidates.len(),
            image_dir.display(),
            result_dir.display()
        );

        Ok(written)
    }

    fn calibrate_file(&self, path: &Path, result_dir: &Path) -> Result<PathBuf> {
        let mut image = FitsImage::open(path)?;
        let size = image.size();
        let exposure = image.exposure_time();
        let date_obs = image.date_obs();
        let mut pixels = image.read_image()?;
        drop(image);

        self.calibrate(&mut pixels, size, exposure)?;

        let output_path = result_dir.join(path.file_name().unwrap_or(path.as_os_str()));
        let mut output = FitsImage::create(&output_path, size)?;
        output.write_image(&pixels)?;
        if let Some(date_obs) = date_obs {
            output.write_key(DATE_OBS_KEY, date_obs, "time of observation")?;
        }
        if let Some(exposure) = exposure {
            output.write_key(EXPTIME_KEY, exposure, "Exposure duration")?;
        }

        tracing::debug!("Calibrated {} -> {}", path.display(), output_path.display());
        Ok(output_path)
    }

    fn load_master(&mut self, role: MasterRole, path: &Path) -> Result<()> {
        let mut image = FitsImage::open(path)?;
        let size = image.size();
        let pixels = image.read_image()?;

        tracing::info!("Loaded {} master {} ({})", role, path.display(), size);
        self.install(role, MasterFrame::new(size, pixels));
        Ok(())
    }

    /// Bias master to subtract from a `role` batch of `frames` size, if one is held.
    fn bias_for(&self, role: MasterRole, frames: ImageSize) -> Result<Option<&MasterFrame>> {
        match &self.zero {
            Some(bias) if bias.size != frames => Err(Error::BiasSizeMismatch {
                role,
                bias: bias.size,
                frames,
            }),
            bias => Ok(bias.as_ref()),
        }
    }

    fn install(&mut self, role: MasterRole, frame: MasterFrame) {
        let size = frame.size;
        if let Some(previous) = self.size
            && previous != size
        {
            tracing::info!("Tracked size changes from {} to {}", previous, size);
        }

        for other in MasterRole::ALL {
            if other == role {
                continue;
            }
            let slot = self.slot_mut(other);
            if let Some(stale) = slot.as_ref().map(|m| m.size)
                && stale != size
            {
                tracing::warn!(
                    "Dropping {} master: its size {} differs from the new {} master ({})",
                    other,
                    stale,
                    role,
                    size
                );
                *slot = None;
            }
        }

        *self.slot_mut(role) = Some(frame);
        self.size = Some(size);
    }

    fn slot(&self, role: MasterRole) -> &Option<MasterFrame> {
        match role {
            MasterRole::Zero => &self.zero,
            MasterRole::Dark => &self.dark,
            MasterRole::Flat => &self.flat,
        }
    }

    fn slot_mut(&mut self, role: MasterRole) -> &mut Option<MasterFrame> {
        match role {
            MasterRole::Zero => &mut self.zero,
            MasterRole::Dark => &mut self.dark,
            MasterRole::Flat => &mut self.flat,
        }
    }
}

fn subtract_row(samples: &mut [f32], bias: &[f32]) {
    for (s, b) in samples.iter_mut().zip(bias) {
        *s -= b;
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Write a master into `dir`, replacing any previous file, stamped with the generation time.
fn write_master(
    dir: &Path,
    role: MasterRole,
    size: ImageSize,
    pixels: &[f32],
    exposure: Option<f32>,
) -> Result<PathBuf> {
    let path = dir.join(role.file_name());
    let mut image = FitsImage::create(&path, size)?;
    image.write_image(pixels)?;

    let generated = Utc::now().format(DATE_OBS_FORMAT).to_string();
    image.write_key(DATE_OBS_KEY, generated, "time of file generated")?;
    if let Some(exposure) = exposure {
        image.write_key(EXPTIME_KEY, exposure, "Exposure duration")?;
    }

    tracing::info!("Wrote {} master to {}", role, path.display());
    Ok(path)
}
