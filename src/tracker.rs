//! Identity tracking: ByteTrack over players and referees, plus routing of
//! per-frame detections into [`Tracks`](crate::Tracks).

mod byte_tracker;
mod kalman_filter;
mod matching;
mod object_tracker;
mod rect;
mod strack;

pub use byte_tracker::{BYTETracker, TrackerConfig};
pub use object_tracker::ObjectTracker;
pub use rect::{Rect, iou_batch};
pub use strack::{STrack, TrackState};
