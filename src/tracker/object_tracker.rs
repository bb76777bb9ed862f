//! Routes classified detections through ByteTrack into per-frame tracks.

use tracing::{debug, info, warn};

use crate::detection::{Detection, ObjectClass};
use crate::tracker::byte_tracker::{BYTETracker, TrackerConfig};
use crate::tracks::Tracks;

/// Builds [`Tracks`] from detector output.
///
/// Players (goalkeepers included) and referees share one ByteTrack instance,
/// so their ids never collide; association is gated by class. The ball is
/// not tracked: the most confident ball box of each frame is kept as-is.
pub struct ObjectTracker {
    tracker: BYTETracker,
}

impl ObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracker: BYTETracker::new(config),
        }
    }

    /// Track a whole video. The result has one entry per input frame.
    pub fn track_frames(&mut self, detections: &[Vec<Detection>]) -> Tracks {
        let mut tracks = Tracks::new(detections.len());
        for (frame, frame_detections) in detections.iter().enumerate() {
            self.track_frame(&mut tracks, frame, frame_detections);
        }
        let identities: std::collections::BTreeSet<_> = tracks
            .players()
            .iter()
            .chain(tracks.referees())
            .flat_map(|records| records.keys().copied())
            .collect();
        info!(
            frames = detections.len(),
            identities = identities.len(),
            "object tracking complete"
        );
        tracks
    }

    /// Track one frame, writing its records into `tracks[frame]`.
    pub fn track_frame(&mut self, tracks: &mut Tracks, frame: usize, detections: &[Detection]) {
        let mut people = Vec::with_capacity(detections.len());
        let mut ball: Option<&Detection> = None;

        for det in detections {
            if !det.is_well_formed() {
                warn!(frame, bbox = ?det.bbox, score = det.score, "dropping malformed detection");
                continue;
            }
            match det.class {
                ObjectClass::Ball => {
                    if ball.is_none_or(|b| det.score > b.score) {
                        ball = Some(det);
                    }
                }
                _ => people.push(*det),
            }
        }

        for track in self.tracker.update(&people) {
            let inserted = match track.class {
                ObjectClass::Referee => tracks.insert_referee(frame, track.track_id, track.tlwh),
                _ => tracks.insert_player(frame, track.track_id, track.tlwh),
            };
            if !inserted {
                debug!(frame, id = track.track_id, "duplicate track id in frame");
            }
        }

        if let Some(ball) = ball {
            tracks.insert_ball(frame, ball.bbox);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::BALL_TRACK_ID;

    fn player(x: f32, score: f32) -> Detection {
        Detection::new(x, 100.0, x + 40.0, 200.0, score, ObjectClass::Player)
    }

    #[test]
    fn test_empty_frame_is_not_an_error() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let tracks = tracker.track_frames(&[vec![], vec![]]);
        assert_eq!(tracks.len(), 2);
        assert!(tracks.players().iter().all(|p| p.is_empty()));
        assert!(tracks.ball().iter().all(|b| b.is_none()));
    }

    #[test]
    fn test_ball_keeps_highest_confidence() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let frame = vec![
            Detection::new(10.0, 10.0, 20.0, 20.0, 0.4, ObjectClass::Ball),
            Detection::new(50.0, 50.0, 60.0, 60.0, 0.8, ObjectClass::Ball),
            Detection::new(90.0, 90.0, 99.0, 99.0, 0.6, ObjectClass::Ball),
        ];
        let tracks = tracker.track_frames(&[frame]);
        let ball = tracks.ball()[0].as_ref().unwrap();
        assert_eq!(ball.bbox().x, 50.0);
        assert_eq!(BALL_TRACK_ID, 1);
    }

    #[test]
    fn test_malformed_boxes_are_dropped() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let frame = vec![
            Detection::new(50.0, 50.0, 40.0, 60.0, 0.9, ObjectClass::Player),
            Detection::new(f32::NAN, 0.0, 10.0, 10.0, 0.9, ObjectClass::Ball),
            player(300.0, 0.9),
        ];
        let tracks = tracker.track_frames(&[frame]);
        assert_eq!(tracks.players()[0].len(), 1);
        assert!(tracks.ball()[0].is_none());
    }

    #[test]
    fn test_goalkeeper_and_referee_routing() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let frame = vec![
            Detection::new(0.0, 100.0, 40.0, 200.0, 0.9, ObjectClass::Goalkeeper),
            Detection::new(400.0, 100.0, 440.0, 200.0, 0.9, ObjectClass::Referee),
        ];
        let tracks = tracker.track_frames(&[frame]);
        assert_eq!(tracks.players()[0].len(), 1);
        assert_eq!(tracks.referees()[0].len(), 1);
        let player_id = tracks.players()[0].keys().next().unwrap();
        let referee_id = tracks.referees()[0].keys().next().unwrap();
        assert_ne!(player_id, referee_id);
    }

    #[test]
    fn test_identity_persists_while_moving() {
        let mut tracker = ObjectTracker::new(TrackerConfig::default());
        let frames: Vec<Vec<Detection>> = (0..10)
            .map(|i| vec![player(100.0 + i as f32 * 3.0, 0.9), player(500.0 - i as f32 * 3.0, 0.9)])
            .collect();
        let tracks = tracker.track_frames(&frames);

        let first: Vec<u64> = tracks.players()[0].keys().copied().collect();
        assert_eq!(first.len(), 2);
        for records in tracks.players() {
            let ids: Vec<u64> = records.keys().copied().collect();
            assert_eq!(ids, first);
        }
        // the left player keeps the same id throughout
        let left = first
            .iter()
            .copied()
            .find(|id| tracks.players()[0][id].bbox().x < 300.0)
            .unwrap();
        assert!(tracks.players()[9][&left].bbox().x < 300.0);
    }
}
