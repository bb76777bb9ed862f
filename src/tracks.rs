//! Per-frame track state shared by all pipeline stages.
//!
//! [`Tracks`] holds three parallel sequences, one entry per processed frame:
//! players and referees map track ids to records, the ball has at most one
//! record per frame. Stages enrich records in pipeline order; record setters
//! only fill empty fields, and each stage declares the stages it depends on
//! through [`Stage`].

mod record;
mod stage;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::tracker::Rect;

pub use record::TrackRecord;
pub use stage::Stage;

pub type TrackId = u64;

/// Id under which the ball is reported; the ball has no tracked identity.
pub const BALL_TRACK_ID: TrackId = 1;

/// Records of one object class in one frame, ordered by track id.
pub type FrameTracks = BTreeMap<TrackId, TrackRecord>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracks {
    players: Vec<FrameTracks>,
    referees: Vec<FrameTracks>,
    ball: Vec<Option<TrackRecord>>,
    stages: BTreeSet<Stage>,
}

impl Tracks {
    /// Empty tracks for `num_frames` frames, ready for downstream stages.
    pub fn new(num_frames: usize) -> Self {
        Self {
            players: vec![FrameTracks::new(); num_frames],
            referees: vec![FrameTracks::new(); num_frames],
            ball: vec![None; num_frames],
            stages: BTreeSet::from([Stage::Tracked]),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[FrameTracks] {
        &self.players
    }

    pub fn referees(&self) -> &[FrameTracks] {
        &self.referees
    }

    pub fn ball(&self) -> &[Option<TrackRecord>] {
        &self.ball
    }

    pub fn player(&self, frame: usize, id: TrackId) -> Option<&TrackRecord> {
        self.players.get(frame)?.get(&id)
    }

    pub fn player_mut(&mut self, frame: usize, id: TrackId) -> Option<&mut TrackRecord> {
        self.players.get_mut(frame)?.get_mut(&id)
    }

    pub(crate) fn players_mut(&mut self) -> &mut [FrameTracks] {
        &mut self.players
    }

    pub(crate) fn ball_mut(&mut self) -> &mut [Option<TrackRecord>] {
        &mut self.ball
    }

    /// Record a player box. An id already present in the frame keeps its record.
    pub fn insert_player(&mut self, frame: usize, id: TrackId, bbox: Rect) -> bool {
        insert_record(&mut self.players, frame, id, bbox)
    }

    pub fn insert_referee(&mut self, frame: usize, id: TrackId, bbox: Rect) -> bool {
        insert_record(&mut self.referees, frame, id, bbox)
    }

    /// Record the ball box unless the frame already has one.
    pub fn insert_ball(&mut self, frame: usize, bbox: Rect) -> bool {
        match self.ball.get_mut(frame) {
            Some(slot) if slot.is_none() => {
                *slot = Some(TrackRecord::new(bbox));
                true
            }
            _ => false,
        }
    }

    /// Ball box per frame, `None` where the ball was not seen.
    pub fn ball_bboxes(&self) -> Vec<Option<Rect>> {
        self.ball.iter().map(|b| b.as_ref().map(|r| r.bbox())).collect()
    }

    /// Visit every record of every class with its frame index.
    pub fn for_each_record_mut(&mut self, mut f: impl FnMut(usize, &mut TrackRecord)) {
        for (frame, records) in self.players.iter_mut().enumerate() {
            records.values_mut().for_each(|r| f(frame, r));
        }
        for (frame, records) in self.referees.iter_mut().enumerate() {
            records.values_mut().for_each(|r| f(frame, r));
        }
        for (frame, record) in self.ball.iter_mut().enumerate() {
            if let Some(r) = record {
                f(frame, r);
            }
        }
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Fail unless every stage `stage` depends on has completed and no
    /// stage that reads the output of `stage` has run yet.
    pub fn require(&self, stage: Stage) -> Result<()> {
        if let Some(&required) = stage.requirements().iter().find(|r| !self.has_stage(**r)) {
            return Err(Error::MissingStage { stage, required });
        }
        match self.stages.iter().find(|s| s.requirements().contains(&stage)) {
            Some(&dependent) => Err(Error::StageOutOfOrder { stage, dependent }),
            None => Ok(()),
        }
    }

    pub(crate) fn complete(&mut self, stage: Stage) {
        debug!(?stage, frames = self.len(), "stage complete");
        self.stages.insert(stage);
    }

    /// The three sequences must each cover exactly `expected` frames.
    pub fn check_len(&self, expected: usize) -> Result<()> {
        for got in [self.players.len(), self.referees.len(), self.ball.len()] {
            if got != expected {
                return Err(Error::TrackLengthMismatch { expected, got });
            }
        }
        Ok(())
    }

    /// Derive reference points: the ball center, the feet of everyone else.
    pub fn add_positions(&mut self) -> Result<()> {
        self.require(Stage::Positioned)?;
        for records in self.players.iter_mut().chain(self.referees.iter_mut()) {
            for record in records.values_mut() {
                let foot = record.bbox().foot_position();
                record.fill_position(foot);
            }
        }
        for record in self.ball.iter_mut().flatten() {
            let center = record.bbox().center_point();
            record.fill_position(center);
        }
        self.complete(Stage::Positioned);
        Ok(())
    }
}

fn insert_record(seq: &mut [FrameTracks], frame: usize, id: TrackId, bbox: Rect) -> bool {
    match seq.get_mut(frame) {
        Some(records) if !records.contains_key(&id) => {
            records.insert(id, TrackRecord::new(bbox));
            true
        }
        _ => false,
    }
}
