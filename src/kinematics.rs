//! Player speed and covered distance from pitch positions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::tracks::{Stage, TrackId, Tracks};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Frames between the two samples a speed is measured from
    pub window: usize,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

/// Windowed speed estimation.
///
/// Frames are split into consecutive windows of `window` frames. A player
/// present with a pitch position at both ends of a window gets one constant
/// speed for the whole window, and the distance between the ends is added to
/// its running total. The last frame of the video only ever serves as an end
/// point.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    window: usize,
    frame_rate: f32,
}

impl SpeedEstimator {
    pub fn new(config: KinematicsConfig, frame_rate: f32) -> Result<Self> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(Error::InvalidFrameRate(frame_rate));
        }
        if config.window == 0 {
            return Err(Error::InvalidConfig("kinematics window must be at least 1 frame".into()));
        }
        Ok(Self {
            window: config.window,
            frame_rate,
        })
    }

    /// Fill `speed` (km/h) and cumulative `distance` (m) on player records.
    pub fn add_speed_and_distance(&self, tracks: &mut Tracks) -> Result<()> {
        tracks.require(Stage::Kinematics)?;

        let n = tracks.len();
        let mut total_distance: HashMap<TrackId, f32> = HashMap::new();
        let mut windows = 0usize;

        for start in (0..n).step_by(self.window) {
            let end = (start + self.window).min(n.saturating_sub(1));
            let elapsed = (end as f32 - start as f32) / self.frame_rate;
            if elapsed <= 0.0 {
                continue;
            }

            let measured: Vec<(TrackId, f32)> = tracks.players()[start]
                .iter()
                .filter_map(|(&id, first)| {
                    let from = first.position_transformed()?;
                    let to = tracks.players()[end].get(&id)?.position_transformed()?;
                    Some((id, (to - from).norm()))
                })
                .collect();

            for (id, distance) in measured {
                let speed_kmh = distance / elapsed * 3.6;
                let total = total_distance.entry(id).or_insert(0.0);
                *total += distance;
                for records in &mut tracks.players_mut()[start..end] {
                    if let Some(record) = records.get_mut(&id) {
                        record.fill_motion(speed_kmh, *total);
                    }
                }
                windows += 1;
            }
        }

        info!(players = total_distance.len(), windows, "speed and distance estimated");
        tracks.complete(Stage::Kinematics);
        Ok(())
    }
}
