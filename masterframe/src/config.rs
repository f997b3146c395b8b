//! Combination parameters.
//!
//! The sample size used by the scale estimator and the three-frame minimum are
//! fixed constants (see [`crate::SAMPLE_SIZE`] and [`crate::MIN_FRAMES`]); only
//! the rejection thresholds and optional cleanup steps are configurable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Asymmetric sigma-clipping thresholds for the average sigma clip reducer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaClip {
    /// Samples at or below `mean - low * rms` are rejected.
    pub low: f32,
    /// Samples at or above `mean + high * rms` are rejected.
    pub high: f32,
}

impl Default for SigmaClip {
    fn default() -> Self {
        Self {
            low: 3.0,
            high: 3.0,
        }
    }
}

impl SigmaClip {
    pub fn new(low: f32, high: f32) -> Self {
        assert!(low > 0.0, "Low sigma must be positive");
        assert!(high > 0.0, "High sigma must be positive");
        Self { low, high }
    }

    /// Symmetric thresholds.
    pub fn symmetric(sigma: f32) -> Self {
        Self::new(sigma, sigma)
    }
}

/// Configuration for building master calibration frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    /// Rejection thresholds used when combining flat frames.
    pub flat_clip: SigmaClip,
    /// Run the local outlier filter on the combined flat before writing it.
    pub remove_flat_noise: bool,
    /// Half-width of the acceptance band of the local outlier filter, in rms units.
    pub outlier_sigma: f32,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            flat_clip: SigmaClip::default(),
            remove_flat_noise: false,
            outlier_sigma: 3.0,
        }
    }
}

impl CombineConfig {
    /// Parse a configuration from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> std::result::Result<Self, serde_yml::Error> {
        serde_yml::from_str(yaml)
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_flat_clip(mut self, clip: SigmaClip) -> Self {
        self.flat_clip = clip;
        self
    }

    pub fn with_flat_noise_removal(mut self, enabled: bool) -> Self {
        self.remove_flat_noise = enabled;
        self
    }
}
