//! Run parameters for every stage, loadable from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::error::{Error, Result};
use crate::kinematics::KinematicsConfig;
use crate::possession::PossessionConfig;
use crate::projection::CourtGeometry;
use crate::team::TeamConfig;
use crate::tracker::TrackerConfig;

/// Parameters of a whole run. Missing tables and keys take their defaults.
///
/// ```toml
/// [tracker]
/// track_buffer = 60
///
/// [court]
/// pixel_vertices = [[110, 1035], [265, 275], [910, 260], [1640, 915]]
///
/// [[team.overrides]]
/// track_id = 91
/// team = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub team: TeamConfig,
    pub camera: CameraConfig,
    pub court: CourtGeometry,
    pub kinematics: KinematicsConfig,
    pub possession: PossessionConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Reject values no stage can run with. The court quadrilateral is
    /// checked when the projection is built.
    pub fn validate(&self) -> Result<()> {
        let t = &self.tracker;
        for (name, value) in [
            ("track_thresh", t.track_thresh),
            ("low_score_thresh", t.low_score_thresh),
            ("match_thresh", t.match_thresh),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("tracker {name} must be in [0, 1], got {value}")));
            }
        }
        if t.low_score_thresh > t.track_thresh {
            return Err(invalid("tracker low_score_thresh exceeds track_thresh".into()));
        }

        if self.team.n_init == 0 || self.team.crop_n_init == 0 || self.team.max_iter == 0 {
            return Err(invalid("team clustering needs at least one restart and iteration".into()));
        }
        if self.team.frame_step == 0 {
            return Err(invalid("team frame_step must be at least 1".into()));
        }

        self.camera.validate()?;

        if self.kinematics.window == 0 {
            return Err(invalid("kinematics window must be at least 1 frame".into()));
        }
        if !(self.possession.max_distance > 0.0 && self.possession.max_distance.is_finite()) {
            return Err(invalid(format!(
                "possession max_distance must be positive, got {}",
                self.possession.max_distance
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::{Team, TeamOverride};

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), PipelineConfig::default());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_tables() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [tracker]
            track_buffer = 60

            [court]
            court_width = 70.0

            [possession]
            default_team = 2

            [[team.overrides]]
            track_id = 91
            team = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.track_buffer, 60);
        assert_eq!(config.tracker.match_thresh, 0.8);
        assert_eq!(config.court.court_width, 70.0);
        assert_eq!(config.court.court_length, 23.32);
        assert_eq!(config.possession.default_team, Team::Two);
        assert_eq!(
            config.team.overrides,
            vec![TeamOverride {
                track_id: 91,
                team: Team::One
            }]
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            PipelineConfig::from_toml_str("[kinematics]\nwindow = 0"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[possession]\ndefault_team = 3"),
            Err(Error::ConfigParse(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[tracker]\nmatch_thresh = 1.5"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "[camera]\nmin_movement = 3.5\n").unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap().camera.min_movement, 3.5);
        assert!(matches!(
            PipelineConfig::load(dir.path().join("missing.toml")),
            Err(Error::Io(_))
        ));
    }
}
