use image::{GrayImage, RgbImage, imageops};
use nalgebra::{Point2, Vector2};
use tracing::{debug, info};

use super::CameraConfig;
use super::features::good_features_to_track;
use super::optical_flow::{Pyramid, PyramidalLk};
use crate::error::Result;
use crate::tracks::{Stage, Tracks};

/// Estimates how far the background has drifted since the first frame.
pub struct CameraMotionEstimator {
    config: CameraConfig,
    flow: PyramidalLk,
}

impl CameraMotionEstimator {
    pub fn new(config: CameraConfig) -> Self {
        let flow = config.optical_flow();
        Self { config, flow }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Cumulative background shift of every frame relative to frame 0.
    ///
    /// Each frame contributes the displacement of its fastest-moving corner
    /// when that exceeds `min_movement`, and nothing otherwise. Corners are
    /// re-detected after every accepted shift and whenever too few of them
    /// survive tracking. Featureless footage yields all-zero movement.
    pub fn estimate(&self, frames: &[RgbImage]) -> Vec<Vector2<f32>> {
        let Some(first) = frames.first() else {
            return Vec::new();
        };

        let first = imageops::grayscale(first);
        let mut prev = self.flow.pyramid(&first);
        let mut corners = self.detect_corners(&first);
        let mut cumulative = Vector2::zeros();
        let mut movement = Vec::with_capacity(frames.len());
        movement.push(cumulative);

        for (index, frame) in frames.iter().enumerate().skip(1) {
            let gray = imageops::grayscale(frame);
            let next = self.flow.pyramid(&gray);

            let (shift, tracked) = self.frame_shift(&prev, &next, &corners);
            match shift {
                Some(shift) => {
                    cumulative += shift;
                    corners = self.detect_corners(&gray);
                    debug!(
                        frame = index,
                        dx = shift.x,
                        dy = shift.y,
                        corners = corners.len(),
                        "camera moved, corners re-detected"
                    );
                }
                None if tracked.len() < self.config.min_features => {
                    corners = self.detect_corners(&gray);
                    debug!(frame = index, corners = corners.len(), "corners re-detected");
                }
                None => corners = tracked,
            }

            movement.push(cumulative);
            prev = next;
        }

        info!(
            frames = frames.len(),
            dx = cumulative.x,
            dy = cumulative.y,
            "camera motion estimated"
        );
        movement
    }

    /// Shift of the fastest corner between two frames, if it counts as
    /// movement, plus the corners that were followed into `next`.
    fn frame_shift(
        &self,
        prev: &Pyramid,
        next: &Pyramid,
        corners: &[Point2<f32>],
    ) -> (Option<Vector2<f32>>, Vec<Point2<f32>>) {
        if corners.len() < self.config.min_features {
            return (None, Vec::new());
        }

        let pairs: Vec<(Point2<f32>, Point2<f32>)> = corners
            .iter()
            .zip(self.flow.track(prev, next, corners))
            .filter_map(|(&old, new)| new.map(|new| (old, new)))
            .collect();
        let tracked: Vec<Point2<f32>> = pairs.iter().map(|&(_, new)| new).collect();
        if pairs.len() < self.config.min_features {
            return (None, tracked);
        }

        let fastest = pairs
            .iter()
            .map(|&(old, new)| new - old)
            .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()));
        let shift = fastest.filter(|d| d.norm() > self.config.min_movement);
        (shift, tracked)
    }

    fn detect_corners(&self, gray: &GrayImage) -> Vec<Point2<f32>> {
        let width = gray.width();
        good_features_to_track(gray, &self.config.feature_params(), |x, _| {
            self.config.in_static_band(x, width)
        })
    }
}

/// Fill `position_adjusted` by removing the camera shift of each frame.
///
/// `movement` holds one cumulative shift per frame, as produced by
/// [`CameraMotionEstimator::estimate`]. Records without a position are left
/// alone.
pub fn add_adjusted_positions(tracks: &mut Tracks, movement: &[Vector2<f32>]) -> Result<()> {
    tracks.require(Stage::CameraAdjusted)?;
    tracks.check_len(movement.len())?;

    tracks.for_each_record_mut(|frame, record| {
        if let Some(position) = record.position() {
            record.fill_position_adjusted(position - movement[frame]);
        }
    });
    tracks.complete(Stage::CameraAdjusted);
    Ok(())
}
