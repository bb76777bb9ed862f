//! Single object track (STrack) for multi-object tracking.

use ndarray::{Array1, Array2};

use crate::detection::{Detection, ObjectClass};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::Rect;

/// Lifecycle of a track inside the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    New,
    Tracked,
    /// Unmatched, kept for re-association until the buffer runs out
    Lost,
}

/// Single object track.
#[derive(Debug, Clone)]
pub struct STrack {
    /// Identifier assigned on activation; 0 until then
    pub track_id: u64,
    pub state: TrackState,
    /// Whether the track has been confirmed
    pub is_activated: bool,
    /// Class of the most recent matched detection
    pub class: ObjectClass,
    pub score: f32,
    /// Frame of the most recent update
    pub frame_id: u32,
    pub start_frame: u32,
    pub tracklet_len: u32,
    /// Kalman filter state mean (8-dim)
    pub mean: Option<Array1<f64>>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Option<Array2<f64>>,
    /// Box of the detection that created or last updated the track
    pub tlwh: Rect,
}

impl STrack {
    pub fn new(tlwh: Rect, score: f32, class: ObjectClass) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            class,
            score,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            tlwh,
        }
    }

    pub fn from_detection(det: &Detection) -> Self {
        Self::new(det.bbox, det.score, det.class.tracked())
    }

    /// Current box: the Kalman estimate when initialised, the raw box otherwise.
    pub fn rect(&self) -> Rect {
        match &self.mean {
            Some(mean) => Rect::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.tlwh,
        }
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    pub fn activate(&mut self, kalman_filter: &KalmanFilter, track_id: u64, frame_id: u32) {
        self.track_id = track_id;

        let (mean, covariance) = kalman_filter.initiate(xyah_f64(&self.tlwh));
        self.mean = Some(mean);
        self.covariance = Some(covariance);
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;

        if frame_id == 1 {
            self.is_activated = true;
        }

        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Bring a lost track back with a new detection, keeping its id.
    pub fn re_activate(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(new_track, kalman_filter);
        self.tracklet_len = 0;
        self.frame_id = frame_id;
    }

    pub fn update(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(new_track, kalman_filter);
        self.tracklet_len += 1;
        self.frame_id = frame_id;
    }

    fn correct(&mut self, new_track: &STrack, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let (new_mean, new_cov) = kalman_filter.update(mean, cov, xyah_f64(&new_track.tlwh));
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
        self.tlwh = new_track.tlwh;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = new_track.score;
        self.class = new_track.class;
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean_to_predict = mean.clone();
            if self.state != TrackState::Tracked {
                mean_to_predict[7] = 0.0;
            }
            let (new_mean, new_cov) = kalman_filter.predict(&mean_to_predict, cov);
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }
}

fn xyah_f64(rect: &Rect) -> [f64; 4] {
    rect.to_xyah().map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_on_first_frame() {
        let kf = KalmanFilter::new();
        let mut track = STrack::new(Rect::new(0.0, 0.0, 10.0, 20.0), 0.9, ObjectClass::Player);
        track.activate(&kf, 7, 1);
        assert_eq!(track.track_id, 7);
        assert!(track.is_activated);
        assert_eq!(track.state, TrackState::Tracked);

        let mut late = STrack::new(Rect::new(0.0, 0.0, 10.0, 20.0), 0.9, ObjectClass::Player);
        late.activate(&kf, 8, 5);
        assert!(!late.is_activated);
    }

    #[test]
    fn test_goalkeeper_detection_becomes_player_track() {
        let det = Detection::new(0.0, 0.0, 10.0, 20.0, 0.8, ObjectClass::Goalkeeper);
        assert_eq!(STrack::from_detection(&det).class, ObjectClass::Player);
    }

    #[test]
    fn test_rect_follows_kalman_state() {
        let kf = KalmanFilter::new();
        let mut track = STrack::new(Rect::new(10.0, 20.0, 30.0, 40.0), 0.9, ObjectClass::Player);
        track.activate(&kf, 1, 1);
        let rect = track.rect();
        assert!((rect.x - 10.0).abs() < 1e-3);
        assert!((rect.height - 40.0).abs() < 1e-3);
    }
}
