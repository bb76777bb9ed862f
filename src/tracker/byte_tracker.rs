//! Main BYTETracker algorithm implementation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::strack::{STrack, TrackState};

/// Configuration for the BYTETracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this score take part in the first association
    pub track_thresh: f32,
    /// Detections at or below this score are ignored entirely
    pub low_score_thresh: f32,
    pub match_thresh: f32,
    /// Frames a lost track is kept for re-association, at 30 fps
    pub track_buffer: u32,
    pub frame_rate: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            low_score_thresh: 0.1,
            match_thresh: 0.8,
            track_buffer: 30,
            frame_rate: 30.0,
        }
    }
}

pub struct BYTETracker {
    tracked_stracks: Vec<STrack>,
    lost_stracks: Vec<STrack>,
    frame_id: u32,
    next_track_id: u64,
    config: TrackerConfig,
    max_time_lost: u32,
    kalman_filter: KalmanFilter,
}

impl BYTETracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            frame_id: 0,
            next_track_id: 1,
            config,
            max_time_lost,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames processed so far.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }

    /// Advance one frame and return the confirmed tracks updated in it.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<STrack> {
        self.frame_id += 1;

        let mut activated_stracks = Vec::new();
        let mut refind_stracks = Vec::new();
        let mut lost_stracks = Vec::new();

        // Step 1: split detections into high-score and low-score
        let mut detections_high = Vec::new();
        let mut detections_low = Vec::new();
        for det in detections {
            if det.score >= self.config.track_thresh {
                detections_high.push(STrack::from_detection(det));
            } else if det.score > self.config.low_score_thresh {
                detections_low.push(STrack::from_detection(det));
            }
        }

        let mut unconfirmed = Vec::new();
        let mut tracked_stracks = Vec::new();
        for track in self.tracked_stracks.drain(..) {
            if track.is_activated {
                tracked_stracks.push(track);
            } else {
                unconfirmed.push(track);
            }
        }

        let mut strack_pool = joint_stracks(tracked_stracks, &self.lost_stracks);

        // Step 2: first association, with high score detections
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let mut dists = matching::iou_distance(&strack_pool, &detections_high);
        matching::fuse_score(&mut dists, &detections_high);

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::linear_assignment(&dists, self.config.match_thresh);

        for (itracked, idet) in matches {
            let mut track = strack_pool[itracked].clone();
            let det = &detections_high[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        // Step 3: second association, with low score detections
        let r_tracked_stracks: Vec<STrack> = unmatched_tracks
            .iter()
            .map(|&idx| &strack_pool[idx])
            .filter(|t| t.state == TrackState::Tracked)
            .cloned()
            .collect();

        let dists_second = matching::iou_distance(&r_tracked_stracks, &detections_low);
        let AssignmentResult {
            matches: matches_second,
            unmatched_tracks: unmatched_tracks_second,
            ..
        } = matching::linear_assignment(&dists_second, 0.5);

        for (itracked, idet) in matches_second {
            let mut track = r_tracked_stracks[itracked].clone();
            track.update(&detections_low[idet], &self.kalman_filter, self.frame_id);
            activated_stracks.push(track);
        }

        for idx in unmatched_tracks_second {
            let mut track = r_tracked_stracks[idx].clone();
            track.mark_lost();
            lost_stracks.push(track);
        }

        // Unconfirmed tracks, usually tracks with only one beginning frame
        let detections_rem: Vec<STrack> = unmatched_detections
            .iter()
            .map(|&idx| detections_high[idx].clone())
            .collect();

        let mut dist_unconfirmed = matching::iou_distance(&unconfirmed, &detections_rem);
        matching::fuse_score(&mut dist_unconfirmed, &detections_rem);

        let AssignmentResult {
            matches: matches_unconfirmed,
            unmatched_detections: unmatched_new,
            ..
        } = matching::linear_assignment(&dist_unconfirmed, 0.7);

        for (itracked, idet) in matches_unconfirmed {
            unconfirmed[itracked].update(&detections_rem[idet], &self.kalman_filter, self.frame_id);
            activated_stracks.push(unconfirmed[itracked].clone());
        }

        // Step 4: init new stracks
        for idx in unmatched_new {
            let mut track = detections_rem[idx].clone();
            if track.score < self.config.track_thresh + 0.1 {
                continue;
            }
            let id = self.allocate_id();
            track.activate(&self.kalman_filter, id, self.frame_id);
            activated_stracks.push(track);
        }

        // Step 5: age out lost tracks
        for track in self.lost_stracks.drain(..) {
            if self.frame_id - track.end_frame() <= self.max_time_lost {
                lost_stracks.push(track);
            }
        }

        self.tracked_stracks = activated_stracks
            .into_iter()
            .chain(refind_stracks)
            .filter(|t| t.state == TrackState::Tracked)
            .collect();

        let lost_stracks = sub_stracks(lost_stracks, &self.tracked_stracks);
        let (tracked, lost) = remove_duplicate_stracks(&self.tracked_stracks, &lost_stracks);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;

        self.tracked_stracks
            .iter()
            .filter(|t| t.is_activated && t.frame_id == self.frame_id)
            .cloned()
            .collect()
    }
}

pub fn joint_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let mut exists = HashSet::new();
    let mut res = Vec::with_capacity(tlista.len() + tlistb.len());
    for t in tlista {
        exists.insert(t.track_id);
        res.push(t);
    }
    for t in tlistb {
        if exists.insert(t.track_id) {
            res.push(t.clone());
        }
    }
    res
}

pub fn sub_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let b_ids: HashSet<u64> = tlistb.iter().map(|t| t.track_id).collect();
    tlista
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id))
        .collect()
}

/// Drop whichever of two heavily overlapping tracks is younger.
pub fn remove_duplicate_stracks(
    stracksa: &[STrack],
    stracksb: &[STrack],
) -> (Vec<STrack>, Vec<STrack>) {
    if stracksa.is_empty() || stracksb.is_empty() {
        return (stracksa.to_vec(), stracksb.to_vec());
    }

    let a_rects: Vec<Rect> = stracksa.iter().map(|t| t.rect()).collect();
    let b_rects: Vec<Rect> = stracksb.iter().map(|t| t.rect()).collect();
    let ious = iou_batch(&a_rects, &b_rects);

    let mut dupa = vec![false; stracksa.len()];
    let mut dupb = vec![false; stracksb.len()];

    for ((i, j), &iou) in ious.indexed_iter() {
        if iou > 0.85 && stracksa[i].class == stracksb[j].class {
            let time_a = stracksa[i].frame_id - stracksa[i].start_frame;
            let time_b = stracksb[j].frame_id - stracksb[j].start_frame;
            if time_a > time_b {
                dupb[j] = true;
            } else {
                dupa[i] = true;
            }
        }
    }

    let keep = |tracks: &[STrack], dup: &[bool]| -> Vec<STrack> {
        tracks
            .iter()
            .zip(dup)
            .filter(|(_, d)| !**d)
            .map(|(t, _)| t.clone())
            .collect()
    };

    (keep(stracksa, &dupa), keep(stracksb, &dupb))
}
