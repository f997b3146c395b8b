//! Collection of same-sized exposures gathered from one directory and prefix.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fits::FitsImage;
use crate::image_size::ImageSize;

/// Minimum number of usable frames in a batch.
///
/// The min-max clipped mean is undefined below three samples.
pub const MIN_FRAMES: usize = 3;

/// Ordered set of open exposures sharing one image size.
///
/// File handles stay open while the batch lives and close when it is dropped.
#[derive(Debug)]
pub struct FrameBatch {
    dir: PathBuf,
    prefix: String,
    frames: Vec<FitsImage>,
    size: ImageSize,
}

/// Open every FITS file in `dir` whose name starts with `prefix`.
///
/// Files that fail to open are skipped with a warning. The size of the first
/// successfully opened file (in sorted name order) is the reference, files of
/// any other size are dropped. Fails with [`Error::NotEnoughFrames`] when fewer
/// than [`MIN_FRAMES`] exposures remain.
pub fn load_frame_set<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<FrameBatch> {
    let dir = dir.as_ref();
    let candidates =
        common::file_utils::files_with_prefix(dir, prefix).map_err(|e| Error::io(dir, e))?;

    let mut frames: Vec<FitsImage> = Vec::with_capacity(candidates.len());
    let mut reference: Option<ImageSize> = None;

    for path in &candidates {
        let frame = match FitsImage::open(path) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let size = frame.size();
        match reference {
            None => reference = Some(size),
            Some(expected) if expected != size => {
                tracing::warn!(
                    "Dropping {}: size {} differs from reference {}",
                    path.display(),
                    size,
                    expected
                );
                continue;
            }
            Some(_) => {}
        }
        frames.push(frame);
    }

    let batch = match reference {
        Some(size) => FrameBatch {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            frames,
            size,
        },
        None => {
            return Err(Error::NotEnoughFrames {
                dir: dir.to_path_buf(),
                prefix: prefix.to_string(),
                found: 0,
                required: MIN_FRAMES,
            });
        }
    };
    batch.ensure_min_frames()?;

    tracing::info!(
        "Loaded {} frames of {} from {} (prefix '{}', {} candidates)",
        batch.len(),
        batch.size,
        dir.display(),
        prefix,
        candidates.len()
    );

    Ok(batch)
}

impl FrameBatch {
    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FitsImage] {
        &self.frames
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [FitsImage] {
        &mut self.frames
    }

    /// Keep only the frames for which `keep` returns true.
    pub(crate) fn retain_mut(&mut self, keep: impl FnMut(&mut FitsImage) -> bool) {
        self.frames.retain_mut(keep);
    }

    pub(crate) fn ensure_min_frames(&self) -> Result<()> {
        if self.frames.len() < MIN_FRAMES {
            return Err(Error::NotEnoughFrames {
                dir: self.dir.clone(),
                prefix: self.prefix.clone(),
                found: self.frames.len(),
                required: MIN_FRAMES,
            });
        }
        Ok(())
    }

    /// Stream the batch row by row and reduce every pixel position.
    ///
    /// For each row, every frame's samples are read and passed to
    /// `prepare(frame_index, row, samples)` for in-place adjustment. Then, per
    /// column, the adjusted samples of all frames (in batch order) go to
    /// `reduce`, whose result is stored row-major in the returned buffer.
    pub(crate) fn combine_rows<P, R>(&mut self, mut prepare: P, mut reduce: R) -> Result<Vec<f32>>
    where
        P: FnMut(usize, usize, &mut [f32]),
        R: FnMut(&[f32]) -> f32,
    {
        let ImageSize { width, height } = self.size;
        let frame_count = self.frames.len();

        let mut rows = vec![0.0f32; frame_count * width];
        let mut samples = vec![0.0f32; frame_count];
        let mut combined = Vec::with_capacity(self.size.pixel_count());

        for row in 0..height {
            for (index, (frame, buf)) in self
                .frames
                .iter_mut()
                .zip(rows.chunks_exact_mut(width))
                .enumerate()
            {
                frame.read_row(row, buf)?;
                prepare(index, row, buf);
            }

            for col in 0..width {
                for (index, sample) in samples.iter_mut().enumerate() {
                    *sample = rows[index * width + col];
                }
                combined.push(reduce(&samples));
            }
        }

        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_constant_frames, write_frame};

    #[test]
    fn test_loads_prefix_matches_only() {
        let dir = tempfile::tempdir().unwrap();
        let size = ImageSize::new(8, 6);
        write_constant_frames(dir.path(), "bias_", size, &[1.0, 2.0, 3.0, 4.0]);
        write_constant_frames(dir.path(), "flat_", size, &[5.0, 6.0, 7.0]);

        let batch = load_frame_set(dir.path(), "bias_").unwrap();
        assert_eq!(batch.len(), 4);
        assert!(!batch.is_empty());
        assert_eq!(batch.size(), size);
        assert!(batch.frames().iter().all(|f| {
            f.path()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("bias_")
        }));
    }

    #[test]
    fn test_drops_frames_with_other_size() {
        let dir = tempfile::tempdir().unwrap();
        let size = ImageSize::new(10, 10);
        write_constant_frames(dir.path(), "bias_a", size, &[1.0, 2.0, 3.0, 4.0]);
        write_frame(dir.path(), "bias_b_odd.fit", ImageSize::new(12, 10), &[0.0; 120], None);

        let batch = load_frame_set(dir.path(), "bias_").unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.frames().iter().all(|f| f.size() == size));
    }

    #[test]
    fn test_reference_is_first_opened_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "bias_0.fit", ImageSize::new(12, 10), &[0.0; 120], None);
        write_constant_frames(dir.path(), "bias_1", ImageSize::new(10, 10), &[1.0, 2.0, 3.0]);

        match load_frame_set(dir.path(), "bias_") {
            Err(Error::NotEnoughFrames { found, .. }) => assert_eq!(found, 1),
            other => panic!("Expected NotEnoughFrames, got {:?}", other),
        }
    }

    #[test]
    fn test_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_frames(dir.path(), "dark_", ImageSize::new(4, 4), &[1.0, 2.0, 3.0]);
        std::fs::write(dir.path().join("dark_notes.txt"), b"not an image").unwrap();

        let batch = load_frame_set(dir.path(), "dark_").unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_rejects_two_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_constant_frames(dir.path(), "flat_", ImageSize::new(4, 4), &[1.0, 2.0]);

        match load_frame_set(dir.path(), "flat_") {
            Err(Error::NotEnoughFrames {
                found, required, ..
            }) => {
                assert_eq!(found, 2);
                assert_eq!(required, MIN_FRAMES);
            }
            other => panic!("Expected NotEnoughFrames, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_match_is_not_enough_frames() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_frame_set(dir.path(), "nothing_"),
            Err(Error::NotEnoughFrames { found: 0, .. })
        ));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_frame_set(dir.path().join("missing"), ""),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_combine_rows_gathers_pixel_samples() {
        let dir = tempfile::tempdir().unwrap();
        let size = ImageSize::new(3, 2);
        for (i, offset) in [0.0f32, 10.0, 20.0].iter().enumerate() {
            let pixels: Vec<f32> = (0..6).map(|v| v as f32 + offset).collect();
            write_frame(dir.path(), &format!("f_{i}.fit"), size, &pixels, None);
        }

        let mut batch = load_frame_set(dir.path(), "f_").unwrap();
        let mut seen_rows = Vec::new();
        let combined = batch
            .combine_rows(
                |index, row, _| seen_rows.push((index, row)),
                |samples| samples.iter().sum(),
            )
            .unwrap();

        // Pixel v collects v, v + 10, v + 20
        let expected: Vec<f32> = (0..6).map(|v| 3.0 * v as f32 + 30.0).collect();
        assert_eq!(combined, expected);
        assert_eq!(seen_rows, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }
}
