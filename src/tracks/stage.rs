use serde::{Deserialize, Serialize};

/// Pipeline stages that enrich [`Tracks`](super::Tracks), in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Identities assigned; records hold boxes only
    Tracked,
    BallInterpolated,
    TeamsAssigned,
    /// `position` filled from boxes
    Positioned,
    CameraAdjusted,
    Projected,
    Kinematics,
    Possession,
}

impl Stage {
    /// Stages whose output this stage reads.
    pub fn requirements(self) -> &'static [Stage] {
        match self {
            Stage::Tracked => &[],
            Stage::BallInterpolated | Stage::TeamsAssigned => &[Stage::Tracked],
            Stage::Positioned => &[Stage::Tracked, Stage::BallInterpolated],
            Stage::CameraAdjusted => &[Stage::Positioned],
            Stage::Projected => &[Stage::CameraAdjusted],
            Stage::Kinematics => &[Stage::Projected],
            Stage::Possession => &[Stage::BallInterpolated, Stage::TeamsAssigned],
        }
    }
}
