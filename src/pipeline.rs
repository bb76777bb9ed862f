//! End-to-end video analysis.

use image::RgbImage;
use nalgebra::Vector2;
use tracing::{debug, info, warn};

use crate::cache::{TrackCache, fingerprint};
use crate::camera::{CameraMotionEstimator, add_adjusted_positions};
use crate::config::PipelineConfig;
use crate::detection::{DetectionSource, detect_frames};
use crate::error::{Error, Result};
use crate::kinematics::SpeedEstimator;
use crate::possession::{BallAssigner, TeamBallControl};
use crate::projection::{CourtGeometry, ViewTransformer};
use crate::team::TeamAssigner;
use crate::tracker::{ObjectTracker, TrackerConfig};
use crate::tracks::Tracks;

/// Draws analysis results onto frames. Renderers only read the tracks.
pub trait FrameRenderer {
    fn render(
        &mut self,
        frames: &[RgbImage],
        tracks: &Tracks,
        team_ball_control: &TeamBallControl,
        camera_movement: &[Vector2<f32>],
    ) -> Vec<RgbImage>;
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tracks: Tracks,
    pub team_ball_control: TeamBallControl,
    /// Cumulative camera shift per frame
    pub camera_movement: Vec<Vector2<f32>>,
    /// Rendered frames, or the input frames when no renderer is set
    pub frames: Vec<RgbImage>,
}

/// Runs every stage over a video, in order.
///
/// The pipeline owns the detector and the configuration; every other stage
/// component is built fresh for each run, so runs never share state.
pub struct Pipeline<D: DetectionSource> {
    detector: D,
    config: PipelineConfig,
    renderer: Option<Box<dyn FrameRenderer>>,
    cache: Option<TrackCache>,
}

impl<D: DetectionSource> Pipeline<D> {
    pub fn new(detector: D, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector,
            config,
            renderer: None,
            cache: None,
        })
    }

    pub fn with_default_config(detector: D) -> Self {
        Self {
            detector,
            config: PipelineConfig::default(),
            renderer: None,
            cache: None,
        }
    }

    pub fn with_renderer(mut self, renderer: impl FrameRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Reuse raw tracking results stored by earlier runs.
    pub fn with_cache(mut self, cache: TrackCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Analyse a video.
    ///
    /// `court` replaces the configured court quadrilateral for this run.
    /// Inputs are validated before any stage runs; an error leaves no
    /// partial output.
    pub fn run(
        &mut self,
        frames: &[RgbImage],
        frame_rate: f32,
        court: Option<CourtGeometry>,
    ) -> Result<PipelineOutput> {
        validate_frames(frames)?;
        let speed = SpeedEstimator::new(self.config.kinematics.clone(), frame_rate)?;
        let court = court.unwrap_or_else(|| self.config.court.clone());
        let transformer = ViewTransformer::new(court)?;
        let possession = BallAssigner::new(self.config.possession.clone())?;

        let tracker_config = TrackerConfig {
            frame_rate,
            ..self.config.tracker.clone()
        };
        let mut tracks = self.raw_tracks(frames, tracker_config)?;

        tracks.interpolate_ball()?;
        TeamAssigner::new(self.config.team.clone()).assign_tracks(frames, &mut tracks)?;
        tracks.add_positions()?;

        let camera_movement =
            CameraMotionEstimator::new(self.config.camera.clone()).estimate(frames);
        add_adjusted_positions(&mut tracks, &camera_movement)?;
        transformer.add_transformed_positions(&mut tracks)?;
        speed.add_speed_and_distance(&mut tracks)?;
        let team_ball_control = possession.resolve_possession(&mut tracks)?;

        let frames = match self.renderer.as_mut() {
            Some(renderer) => {
                renderer.render(frames, &tracks, &team_ball_control, &camera_movement)
            }
            None => frames.to_vec(),
        };

        info!(frames = frames.len(), frame_rate, "video analysed");
        Ok(PipelineOutput {
            tracks,
            team_ball_control,
            camera_movement,
            frames,
        })
    }

    /// Detection and tracking, or their cached result.
    fn raw_tracks(&mut self, frames: &[RgbImage], tracker_config: TrackerConfig) -> Result<Tracks> {
        let key = match &self.cache {
            Some(_) => Some(fingerprint(&self.detector.fingerprint(), &tracker_config, frames)?),
            None => None,
        };

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(tracks) = cache.load(key)? {
                if tracks.check_len(frames.len()).is_ok() {
                    info!(path = %cache.path().display(), "using cached tracks");
                    return Ok(tracks);
                }
                warn!(
                    cached = tracks.len(),
                    frames = frames.len(),
                    "cached tracks cover a different number of frames, recomputing"
                );
            }
        }

        let detections = detect_frames(&mut self.detector, frames)?;
        debug!(frames = detections.len(), "detection complete");
        let tracks = ObjectTracker::new(tracker_config).track_frames(&detections);

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            cache.store(key, &tracks)?;
        }
        Ok(tracks)
    }
}

fn validate_frames(frames: &[RgbImage]) -> Result<()> {
    let first = frames.first().ok_or(Error::EmptyVideo)?;
    let expected = first.dimensions();
    if expected.0 == 0 || expected.1 == 0 {
        return Err(Error::EmptyVideo);
    }
    for (frame, image) in frames.iter().enumerate().skip(1) {
        let got = image.dimensions();
        if got != expected {
            return Err(Error::FrameSizeMismatch {
                frame,
                expected,
                got,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;

    struct NoDetections;

    impl DetectionSource for NoDetections {
        type Error = std::convert::Infallible;

        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> std::result::Result<Vec<Detection>, Self::Error> {
            Ok(Vec::new())
        }
    }

    struct BrokenDetector;

    impl DetectionSource for BrokenDetector {
        type Error = String;

        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> std::result::Result<Vec<Detection>, Self::Error> {
            Err("model not loaded".to_string())
        }
    }

    fn frames(n: usize) -> Vec<RgbImage> {
        vec![RgbImage::from_pixel(64, 48, image::Rgb([30, 140, 40])); n]
    }

    #[test]
    fn test_empty_video() {
        let mut pipeline = Pipeline::with_default_config(NoDetections);
        assert!(matches!(pipeline.run(&[], 24.0, None), Err(Error::EmptyVideo)));
    }

    #[test]
    fn test_frame_size_mismatch() {
        let mut input = frames(3);
        input[2] = RgbImage::new(32, 48);
        let mut pipeline = Pipeline::with_default_config(NoDetections);
        assert!(matches!(
            pipeline.run(&input, 24.0, None),
            Err(Error::FrameSizeMismatch { frame: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_frame_rate() {
        let mut pipeline = Pipeline::with_default_config(NoDetections);
        assert!(matches!(
            pipeline.run(&frames(2), f32::NAN, None),
            Err(Error::InvalidFrameRate(_))
        ));
    }

    #[test]
    fn test_detector_failure_is_reported() {
        let mut pipeline = Pipeline::with_default_config(BrokenDetector);
        match pipeline.run(&frames(2), 24.0, None) {
            Err(Error::Detection(message)) => assert!(message.contains("model not loaded")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_frames_still_produce_full_tracks() {
        let mut pipeline = Pipeline::with_default_config(NoDetections);
        let output = pipeline.run(&frames(4), 24.0, None).unwrap();

        assert!(output.tracks.check_len(4).is_ok());
        assert!(output.tracks.ball().iter().all(|b| b.is_none()));
        assert_eq!(output.camera_movement.len(), 4);
        assert_eq!(output.team_ball_control.len(), 4);
        assert_eq!(output.frames.len(), 4);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.kinematics.window = 0;
        assert!(matches!(Pipeline::new(NoDetections, config), Err(Error::InvalidConfig(_))));
    }
}
