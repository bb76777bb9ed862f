//! Error type shared by every pipeline stage.

use crate::tracks::Stage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The video yielded no frames.
    #[error("video contains no frames")]
    EmptyVideo,

    #[error("frame {frame} has size {got:?}, expected {expected:?}")]
    FrameSizeMismatch {
        frame: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(f32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The court quadrilateral does not define a projective transform.
    #[error("court reference points are degenerate")]
    DegenerateCourt,

    /// Team prediction was requested before team colors were fitted.
    #[error("team color model has not been fitted")]
    TeamModelNotFitted,

    #[error("stage {stage:?} requires {required:?} to run first")]
    MissingStage { stage: Stage, required: Stage },

    /// A stage ran after a stage that reads its output.
    #[error("stage {stage:?} cannot run after {dependent:?}")]
    StageOutOfOrder { stage: Stage, dependent: Stage },

    #[error("track sequences have {got} frames, expected {expected}")]
    TrackLengthMismatch { expected: usize, got: usize },

    #[error("detector failed: {0}")]
    Detection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("track cache is corrupt: {0}")]
    CacheFormat(#[from] serde_json::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
