//! Team assignment from jersey colors.
//!
//! Team colors are fitted once per video by clustering the jersey colors of
//! the players in one frame into two groups. Every player identity is then
//! classified on first sight and keeps that team for the rest of the run.

mod assigner;
mod color;
mod kmeans;

use serde::{Deserialize, Serialize};

use crate::tracks::TrackId;

pub use assigner::TeamAssigner;
pub use color::ColorExtractor;
pub use kmeans::{KMeans, KMeansParams};

/// Mean RGB color, channels in 0..=255.
pub type Color = [f32; 3];

/// One of the two teams on the pitch. Which side is `One` is arbitrary but
/// fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Team {
    One,
    Two,
}

impl Team {
    /// Numeric team id, 1 or 2.
    pub fn id(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }

    /// Team for a 0-based cluster label.
    pub fn from_cluster(label: usize) -> Self {
        if label == 0 { Team::One } else { Team::Two }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> u8 {
        team.id()
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Team::One),
            2 => Ok(Team::Two),
            other => Err(format!("team id must be 1 or 2, got {other}")),
        }
    }
}

/// Forces a track id onto a team regardless of its jersey color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamOverride {
    pub track_id: TrackId,
    pub team: Team,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Restarts when clustering player colors into teams
    pub n_init: usize,
    /// Restarts when clustering the pixels of one player crop
    pub crop_n_init: usize,
    pub max_iter: usize,
    pub tolerance: f32,
    pub seed: u64,
    /// Classify players on every n-th frame; other frames reuse cached teams
    pub frame_step: usize,
    pub overrides: Vec<TeamOverride>,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            crop_n_init: 1,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 0,
            frame_step: 1,
            overrides: Vec::new(),
        }
    }
}
