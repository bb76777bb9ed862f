//! Football match analysis on top of ByteTrack.
//!
//! The crate turns per-frame detections into stable player, referee and ball
//! tracks, then enriches them stage by stage: ball gap interpolation, team
//! assignment from jersey colors, camera motion compensation, projection to
//! pitch coordinates, speed and distance, and ball possession.
//!
//! [`Pipeline`] wires the stages together; every stage is also usable on its
//! own against a [`Tracks`] collection.

pub mod cache;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod interpolation;
pub mod kinematics;
pub mod pipeline;
pub mod possession;
pub mod projection;
pub mod team;
pub mod tracker;
pub mod tracks;

pub use camera::CameraMotionEstimator;
pub use config::PipelineConfig;
pub use detection::{Detection, DetectionBuilder, DetectionSource, ObjectClass};
pub use error::{Error, Result};
pub use kinematics::SpeedEstimator;
pub use pipeline::{FrameRenderer, Pipeline, PipelineOutput};
pub use possession::{BallAssigner, TeamBallControl};
pub use projection::{CourtGeometry, ViewTransformer};
pub use team::{Team, TeamAssigner};
pub use tracker::{BYTETracker, ObjectTracker, Rect, TrackerConfig};
pub use tracks::{BALL_TRACK_ID, Stage, TrackId, TrackRecord, Tracks};
