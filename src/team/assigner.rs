use std::collections::{BTreeMap, HashMap};

use image::RgbImage;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use super::color::ColorExtractor;
use super::kmeans::{KMeans, KMeansParams};
use super::{Color, Team, TeamConfig};
use crate::error::{Error, Result};
use crate::tracker::Rect;
use crate::tracks::{Stage, TrackId, Tracks};

/// Assigns players to teams by jersey color and remembers each decision.
pub struct TeamAssigner {
    config: TeamConfig,
    extractor: ColorExtractor,
    model: Option<KMeans>,
    team_colors: BTreeMap<Team, Color>,
    player_teams: HashMap<TrackId, Team>,
    overrides: HashMap<TrackId, Team>,
    rng: StdRng,
}

impl TeamAssigner {
    pub fn new(config: TeamConfig) -> Self {
        let extractor = ColorExtractor::new(config.crop_n_init, config.max_iter, config.tolerance);
        let overrides = config.overrides.iter().map(|o| (o.track_id, o.team)).collect();
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            extractor,
            model: None,
            team_colors: BTreeMap::new(),
            player_teams: HashMap::new(),
            overrides,
            rng,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    pub fn team_color(&self, team: Team) -> Option<Color> {
        self.team_colors.get(&team).copied()
    }

    pub fn team_colors(&self) -> &BTreeMap<Team, Color> {
        &self.team_colors
    }

    /// Teams decided so far, by player id.
    pub fn player_teams(&self) -> &HashMap<TrackId, Team> {
        &self.player_teams
    }

    /// Fit the two team colors from the players of one frame.
    ///
    /// Returns `false` and leaves the model unfitted when fewer than two
    /// player colors could be extracted. Once fitted, later calls are no-ops.
    pub fn assign_team_colors(&mut self, frame: &RgbImage, players: &[Rect]) -> bool {
        if self.is_fitted() {
            return true;
        }

        let colors: Vec<Color> = players
            .iter()
            .filter_map(|bbox| self.extractor.player_color(frame, bbox, &mut self.rng))
            .collect();
        if colors.len() < 2 {
            debug!(players = colors.len(), "not enough players to fit team colors");
            return false;
        }

        let data = Array2::from_shape_fn((colors.len(), 3), |(i, c)| colors[i][c]);
        let params = KMeansParams {
            k: 2,
            n_init: self.config.n_init,
            max_iter: self.config.max_iter,
            tol: self.config.tolerance,
        };
        let Some(model) = KMeans::fit(data.view(), &params, &mut self.rng) else {
            return false;
        };

        for label in 0..2 {
            let c = model.centroid(label);
            self.team_colors.insert(Team::from_cluster(label), [c[0], c[1], c[2]]);
        }
        info!(
            players = colors.len(),
            team_one = ?self.team_colors.get(&Team::One),
            team_two = ?self.team_colors.get(&Team::Two),
            "team colors fitted"
        );
        self.model = Some(model);
        true
    }

    /// Team of `player_id`, classifying it from `bbox` on first sight.
    ///
    /// Returns `Ok(None)` when the box covers no pixels and the player has
    /// no cached team or override; nothing is cached in that case.
    pub fn get_player_team(
        &mut self,
        frame: &RgbImage,
        bbox: &Rect,
        player_id: TrackId,
    ) -> Result<Option<Team>> {
        if let Some(&team) = self.player_teams.get(&player_id) {
            return Ok(Some(team));
        }
        let model = self.model.as_ref().ok_or(Error::TeamModelNotFitted)?;

        let predicted = self
            .extractor
            .player_color(frame, bbox, &mut self.rng)
            .map(|color| Team::from_cluster(model.predict(ndarray::aview1(&color))));

        let Some(team) = self.overrides.get(&player_id).copied().or(predicted) else {
            return Ok(None);
        };
        self.player_teams.insert(player_id, team);
        Ok(Some(team))
    }

    /// Fit team colors on the first frame with at least two players, then
    /// label every player record with its team and team color.
    ///
    /// Videos that never show two players get no team labels.
    pub fn assign_tracks(&mut self, frames: &[RgbImage], tracks: &mut Tracks) -> Result<()> {
        tracks.require(Stage::TeamsAssigned)?;
        tracks.check_len(frames.len())?;

        let seed_frame = (0..frames.len()).find(|&i| {
            let boxes: Vec<Rect> = tracks.players()[i].values().map(|r| r.bbox()).collect();
            boxes.len() >= 2 && self.assign_team_colors(&frames[i], &boxes)
        });
        let Some(seed_frame) = seed_frame else {
            info!("no frame with two players, skipping team assignment");
            tracks.complete(Stage::TeamsAssigned);
            return Ok(());
        };
        debug!(seed_frame, "team colors seeded");

        let step = self.config.frame_step.max(1);
        for frame in (0..frames.len()).step_by(step) {
            let players: Vec<(TrackId, Rect)> = tracks.players()[frame]
                .iter()
                .map(|(&id, r)| (id, r.bbox()))
                .collect();
            for (id, bbox) in players {
                self.get_player_team(&frames[frame], &bbox, id)?;
            }
        }

        for records in tracks.players_mut() {
            for (id, record) in records.iter_mut() {
                if let Some(&team) = self.player_teams.get(id) {
                    if let Some(color) = self.team_color(team) {
                        record.fill_team(team, color);
                    }
                }
            }
        }

        info!(players = self.player_teams.len(), "team assignment complete");
        tracks.complete(Stage::TeamsAssigned);
        Ok(())
    }
}
