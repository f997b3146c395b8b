//! Masterframe - robust combination of astronomical calibration exposures.
//!
//! This library turns directories of raw calibration exposures into master frames:
//! - Bias ("zero") frames combined with a min-max clipped mean
//! - Dark frames bias-subtracted, scaled to unit exposure and min-max combined
//! - Flat frames bias-subtracted, normalized by a sampled median and combined
//!   with iterative average sigma clipping
//!
//! It also provides the pixel-level estimators behind those combinations and a
//! local outlier filter for post-combination cleanup.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use masterframe::{CalibrationCombiner, CombineConfig, MasterRole};
//!
//! let mut combiner = CalibrationCombiner::new(CombineConfig::default());
//! combiner.combine_zero("/data/bias", "bias_")?;
//! combiner.combine_flat("/data/flats", "flat_")?;
//!
//! assert!(combiner.state().is_valid(MasterRole::Flat));
//! ```

mod calibration_masters;
pub mod combine;
mod config;
mod error;
mod fits;
mod frame_set;
mod image_size;
pub mod math;
pub mod outlier_filter;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Core types
// ============================================================================

pub use error::{Error, Result};
pub use fits::FitsImage;
pub use image_size::ImageSize;

// ============================================================================
// Calibration
// ============================================================================

pub use calibration_masters::{CalibrationCombiner, CalibrationState, MasterFrame, MasterRole};
pub use config::{CombineConfig, SigmaClip};
pub use frame_set::{FrameBatch, MIN_FRAMES, load_frame_set};

// ============================================================================
// Estimators
// ============================================================================

pub use combine::{minmax_clip, sigma_clip_mean};
pub use math::statistics::{SAMPLE_SIZE, sample_median};
pub use outlier_filter::remove_noise;
