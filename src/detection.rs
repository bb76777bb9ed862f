//! Detection adapter: the boundary between an external object detector and
//! the tracking pipeline.
//!
//! The detector itself is a black box behind [`DetectionSource`]. It reports,
//! per frame, a list of boxes with a class label and a confidence.

mod builder;
mod source;

use serde::{Deserialize, Serialize};

use crate::tracker::Rect;

pub use builder::DetectionBuilder;
pub use source::{DetectionSource, detect_frames};

/// Object classes reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Player,
    Goalkeeper,
    Referee,
    Ball,
}

impl ObjectClass {
    /// Parse a detector label name, e.g. `"goalkeeper"`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "player" => Some(Self::Player),
            "goalkeeper" => Some(Self::Goalkeeper),
            "referee" => Some(Self::Referee),
            "ball" => Some(Self::Ball),
            _ => None,
        }
    }

    /// Class used for identity tracking. Goalkeepers are tracked as players.
    pub fn tracked(self) -> Self {
        match self {
            Self::Goalkeeper => Self::Player,
            other => other,
        }
    }
}

/// One detector output box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: Rect,
    pub score: f32,
    pub class: ObjectClass,
}

impl Detection {
    /// Create a detection from TLBR corners.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class: ObjectClass) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            class,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32, class: ObjectClass) -> Self {
        Self { bbox, score, class }
    }

    pub fn is_well_formed(&self) -> bool {
        self.bbox.is_well_formed() && self.score.is_finite()
    }
}
