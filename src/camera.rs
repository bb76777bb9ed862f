//! Camera motion estimation.
//!
//! Corners are picked in column bands of the frame that show static
//! background (the left margin and the stadium banner band in broadcast
//! footage) and followed with pyramidal Lucas-Kanade flow. The largest point
//! displacement of a frame is taken as the camera shift for that frame.

mod estimator;
pub mod features;
pub mod optical_flow;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use estimator::{CameraMotionEstimator, add_adjusted_positions};
pub use features::{FeatureParams, good_features_to_track};
pub use optical_flow::{Pyramid, PyramidalLk};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame shifts at or below this many pixels count as no movement
    pub min_movement: f32,
    pub max_features: usize,
    /// Corners weaker than this fraction of the strongest one are dropped
    pub quality_level: f32,
    pub min_distance: f32,
    pub block_size: u32,
    /// Side of the square Lucas-Kanade window, in pixels
    pub window_size: usize,
    /// Pyramid levels above full resolution
    pub max_level: usize,
    pub iterations: usize,
    pub epsilon: f32,
    /// Below this many tracked corners a frame reports no movement
    pub min_features: usize,
    /// Column ranges `[start, end)` searched for corners, as fractions of the
    /// frame width
    pub static_bands: Vec<[f32; 2]>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_movement: 5.0,
            max_features: 100,
            quality_level: 0.3,
            min_distance: 3.0,
            block_size: 7,
            window_size: 15,
            max_level: 2,
            iterations: 10,
            epsilon: 0.03,
            min_features: 4,
            static_bands: vec![[0.0, 20.0 / 1920.0], [900.0 / 1920.0, 1050.0 / 1920.0]],
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "camera quality_level must be in (0, 1], got {}",
                self.quality_level
            )));
        }
        if self.window_size < 3 {
            return Err(Error::InvalidConfig(format!(
                "camera window_size must be at least 3, got {}",
                self.window_size
            )));
        }
        if !self.min_movement.is_finite() || self.min_movement < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "camera min_movement must be non-negative, got {}",
                self.min_movement
            )));
        }
        for &[start, end] in &self.static_bands {
            if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) || start >= end {
                return Err(Error::InvalidConfig(format!(
                    "camera static band [{start}, {end}) is not a sub-range of [0, 1]"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn feature_params(&self) -> FeatureParams {
        FeatureParams {
            max_corners: self.max_features,
            quality_level: self.quality_level,
            min_distance: self.min_distance,
            block_size: self.block_size,
        }
    }

    pub(crate) fn optical_flow(&self) -> PyramidalLk {
        PyramidalLk {
            window: self.window_size,
            max_level: self.max_level,
            iterations: self.iterations,
            epsilon: self.epsilon,
        }
    }

    /// Whether column `x` of a `width` pixel frame lies in a static band.
    pub(crate) fn in_static_band(&self, x: u32, width: u32) -> bool {
        let x = x as f32;
        let width = width as f32;
        self.static_bands
            .iter()
            .any(|&[start, end]| x >= start * width && x < end * width)
    }
}

#[cfg(test)]
pub(crate) mod test_frames {
    use image::{Rgb, RgbImage};

    const BLOBS: [(f32, f32); 6] = [
        (30.0, 30.0),
        (80.0, 40.0),
        (130.0, 30.0),
        (40.0, 90.0),
        (95.0, 85.0),
        (140.0, 95.0),
    ];

    /// Smooth gaussian blobs on a dark background, offset by `shift`.
    pub(crate) fn blob_frame(width: u32, height: u32, shift: (f32, f32)) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v: f32 = BLOBS
                .iter()
                .map(|&(bx, by)| {
                    let dx = x as f32 - bx - shift.0;
                    let dy = y as f32 - by - shift.1;
                    200.0 * (-(dx * dx + dy * dy) / 50.0).exp()
                })
                .sum();
            let v = (20.0 + v).min(255.0) as u8;
            Rgb([v, v, v])
        })
    }
}
