//! Ball possession.

use nalgebra::{Point2, distance};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::team::Team;
use crate::tracker::Rect;
use crate::tracks::{FrameTracks, Stage, TrackId, Tracks};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Pixels between a player's foot and the ball center
    pub max_distance: f32,
    /// Controlling team before anyone has touched the ball, and for players
    /// without a team
    pub default_team: Team,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_distance: 70.0,
            default_team: Team::One,
        }
    }
}

/// Team in control of the ball, one entry per frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamBallControl {
    teams: Vec<Team>,
}

impl TeamBallControl {
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<Team> {
        self.teams.get(frame).copied()
    }

    /// Fraction of frames `0..=frame` controlled by each team, as
    /// `(team one, team two)`.
    pub fn share_until(&self, frame: usize) -> Option<(f32, f32)> {
        let upto = self.teams.get(..=frame)?;
        let one = upto.iter().filter(|&&t| t == Team::One).count() as f32;
        let total = upto.len() as f32;
        Some((one / total, (total - one) / total))
    }

    /// Possession share over the whole video.
    pub fn share(&self) -> Option<(f32, f32)> {
        self.share_until(self.teams.len().checked_sub(1)?)
    }
}

/// Finds the player holding the ball and tracks control over time.
#[derive(Debug, Clone)]
pub struct BallAssigner {
    config: PossessionConfig,
}

impl BallAssigner {
    pub fn new(config: PossessionConfig) -> Result<Self> {
        if !config.max_distance.is_finite() || config.max_distance <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "possession max_distance must be positive, got {}",
                config.max_distance
            )));
        }
        Ok(Self { config })
    }

    /// The player closest to the ball, if within reach.
    ///
    /// A player's distance is measured from whichever bottom corner of its
    /// box is nearer to the ball center. Equal distances keep the lower id.
    pub fn assign(&self, players: &FrameTracks, ball: &Rect) -> Option<TrackId> {
        let ball = ball.center_point();
        let mut best: Option<(TrackId, f32)> = None;

        for (&id, record) in players {
            let bbox = record.bbox();
            let left = Point2::new(bbox.x, bbox.y2());
            let right = Point2::new(bbox.x2(), bbox.y2());
            let d = distance(&left, &ball).min(distance(&right, &ball));
            if d < self.config.max_distance && best.is_none_or(|(_, b)| d < b) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Mark the ball holder of every frame and resolve the team in control.
    ///
    /// Frames where nobody is within reach, or without a ball, keep the
    /// previous frame's team.
    pub fn resolve_possession(&self, tracks: &mut Tracks) -> Result<TeamBallControl> {
        tracks.require(Stage::Possession)?;

        let mut teams = Vec::with_capacity(tracks.len());
        let mut touches = 0usize;
        for frame in 0..tracks.len() {
            let holder = tracks.ball()[frame]
                .as_ref()
                .and_then(|ball| self.assign(&tracks.players()[frame], &ball.bbox()));

            let team = match holder.and_then(|id| tracks.player_mut(frame, id)) {
                Some(record) => {
                    record.mark_has_ball();
                    touches += 1;
                    record.team().unwrap_or(self.config.default_team)
                }
                None => teams.last().copied().unwrap_or(self.config.default_team),
            };
            teams.push(team);
        }

        let control = TeamBallControl { teams };
        if let Some((one, two)) = control.share() {
            info!(
                frames = control.len(),
                touches,
                team_one = one,
                team_two = two,
                "possession resolved"
            );
        }
        tracks.complete(Stage::Possession);
        Ok(control)
    }
}
