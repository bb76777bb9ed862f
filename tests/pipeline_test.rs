use std::cell::Cell;
use std::rc::Rc;

use image::{Rgb, RgbImage};
use nalgebra::Vector2;
use pitchtrack::cache::TrackCache;
use pitchtrack::projection::CourtGeometry;
use pitchtrack::{
    Detection, DetectionSource, FrameRenderer, ObjectClass, Pipeline, PipelineConfig, Team,
    TeamBallControl, TrackId, Tracks,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FRAMES: usize = 12;

const GRASS: Rgb<u8> = Rgb([30, 140, 40]);
const RED: Rgb<u8> = Rgb([220, 20, 30]);
const BLUE: Rgb<u8> = Rgb([20, 30, 210]);
const YELLOW: Rgb<u8> = Rgb([230, 220, 20]);

/// Left edge, top edge and shirt of each person; everyone walks 1 px right
/// per frame.
const PLAYERS: [(f32, f32, Rgb<u8>); 4] = [
    (10.0, 100.0, RED),
    (90.0, 100.0, BLUE),
    (190.0, 100.0, RED),
    (260.0, 100.0, BLUE),
];
const REFEREE: (f32, f32, Rgb<u8>) = (250.0, 20.0, YELLOW);

fn person_box(x: f32, y: f32, frame: usize) -> [f32; 4] {
    let x = x + frame as f32;
    [x, y, x + 30.0, y + 60.0]
}

fn paint_shirt(image: &mut RgbImage, bbox: [f32; 4], shirt: Rgb<u8>) {
    let (x1, y1) = (bbox[0] as u32, bbox[1] as u32);
    for y in y1 + 5..y1 + 28 {
        for x in x1 + 5..x1 + 25 {
            image.put_pixel(x, y, shirt);
        }
    }
}

fn video() -> Vec<RgbImage> {
    (0..FRAMES)
        .map(|frame| {
            let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, GRASS);
            for &(x, y, shirt) in PLAYERS.iter().chain([&REFEREE]) {
                paint_shirt(&mut image, person_box(x, y, frame), shirt);
            }
            image
        })
        .collect()
}

/// Scripted detector: replays fixed detections and counts the frames it saw.
struct ScriptedDetector {
    frame: usize,
    calls: Rc<Cell<usize>>,
}

impl ScriptedDetector {
    fn new() -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                frame: 0,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl DetectionSource for ScriptedDetector {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        let frame = self.frame;
        self.frame += 1;
        self.calls.set(self.calls.get() + 1);

        let mut detections: Vec<Detection> = PLAYERS
            .iter()
            .enumerate()
            .map(|(i, &(x, y, _))| {
                let [x1, y1, x2, y2] = person_box(x, y, frame);
                let class = if i == 3 { ObjectClass::Goalkeeper } else { ObjectClass::Player };
                Detection::new(x1, y1, x2, y2, 0.9, class)
            })
            .collect();
        let [x1, y1, x2, y2] = person_box(REFEREE.0, REFEREE.1, frame);
        detections.push(Detection::new(x1, y1, x2, y2, 0.85, ObjectClass::Referee));

        // the ball sits at the right foot of the first player, and the
        // detector misses it on frames 3 and 4
        if frame != 3 && frame != 4 {
            let cx = person_box(PLAYERS[0].0, PLAYERS[0].1, frame)[2] + 10.0;
            let cy = 156.0;
            detections.push(Detection::new(
                cx - 4.0,
                cy - 4.0,
                cx + 4.0,
                cy + 4.0,
                0.6,
                ObjectClass::Ball,
            ));
            // a weaker duplicate that must be discarded
            detections.push(Detection::new(5.0, 5.0, 13.0, 13.0, 0.2, ObjectClass::Ball));
        }
        Ok(detections)
    }

    fn fingerprint(&self) -> String {
        "scripted-v1".to_string()
    }
}

fn court() -> CourtGeometry {
    CourtGeometry {
        pixel_vertices: [
            [0.0, HEIGHT as f32],
            [0.0, 0.0],
            [WIDTH as f32, 0.0],
            [WIDTH as f32, HEIGHT as f32],
        ],
        court_width: 68.0,
        court_length: 105.0,
    }
}

fn player_at(tracks: &Tracks, frame: usize, x: f32) -> TrackId {
    tracks.players()[frame]
        .iter()
        .find(|(_, r)| (r.bbox().x - x).abs() < 0.5)
        .map(|(&id, _)| id)
        .expect("player should be tracked")
}

#[test]
fn test_full_run() {
    let (detector, _) = ScriptedDetector::new();
    let mut pipeline = Pipeline::new(detector, PipelineConfig::default()).unwrap();
    let frames = video();
    let output = pipeline.run(&frames, 24.0, Some(court())).unwrap();
    let tracks = &output.tracks;

    // every sequence covers every frame
    assert!(tracks.check_len(FRAMES).is_ok());
    assert_eq!(output.team_ball_control.len(), FRAMES);
    assert_eq!(output.camera_movement.len(), FRAMES);
    assert_eq!(output.frames, frames);

    // stable identities, goalkeeper merged into players
    let ids: Vec<TrackId> = tracks.players()[0].keys().copied().collect();
    assert_eq!(ids.len(), 4);
    for frame in 1..FRAMES {
        let again: Vec<TrackId> = tracks.players()[frame].keys().copied().collect();
        assert_eq!(again, ids);
        assert_eq!(tracks.referees()[frame].len(), 1);
    }
    let referee_id = *tracks.referees()[0].keys().next().unwrap();
    assert!(!ids.contains(&referee_id));

    // one ball per frame, gaps interpolated, weaker duplicates dropped
    for (frame, ball) in tracks.ball().iter().enumerate() {
        let ball = ball.as_ref().expect("ball interpolated");
        let expected = person_box(PLAYERS[0].0, PLAYERS[0].1, frame)[2] + 10.0;
        assert!((ball.bbox().center().0 - expected).abs() < 1e-3);
    }

    // shirts decide teams
    let red_a = player_at(tracks, 0, PLAYERS[0].0);
    let blue_a = player_at(tracks, 0, PLAYERS[1].0);
    let red_b = player_at(tracks, 0, PLAYERS[2].0);
    let blue_b = player_at(tracks, 0, PLAYERS[3].0);
    let team = |id| tracks.player(0, id).unwrap().team();
    assert!(team(red_a).is_some());
    assert_eq!(team(red_a), team(red_b));
    assert_eq!(team(blue_a), team(blue_b));
    assert_ne!(team(red_a), team(blue_a));

    // grass has no corners: no camera movement, adjusted == raw
    assert!(output.camera_movement.iter().all(|m| *m == Vector2::zeros()));
    let record = tracks.player(0, red_a).unwrap();
    assert_eq!(record.position_adjusted(), record.position());

    // 5 px over 5 frames at 24 fps, 105 m across 320 px
    let speed = record.speed().unwrap();
    let expected = 5.0 * 105.0 / 320.0 / (5.0 / 24.0) * 3.6;
    assert!((speed - expected).abs() < 0.05, "speed {speed}, expected {expected}");
    assert!(tracks.player(FRAMES - 1, red_a).unwrap().speed().is_none());

    // the first red player keeps the ball throughout
    let red_team = team(red_a).unwrap();
    assert!(output.team_ball_control.teams().iter().all(|&t| t == red_team));
    assert!((0..FRAMES).all(|f| tracks.player(f, red_a).unwrap().has_ball()));
    assert!(!tracks.player(0, blue_a).unwrap().has_ball());
    let (one, two) = output.team_ball_control.share().unwrap();
    assert_eq!(if red_team == Team::One { one } else { two }, 1.0);
}

#[test]
fn test_team_override() {
    let (detector, _) = ScriptedDetector::new();
    let mut config = PipelineConfig::default();

    // find out which id the second red player gets, then force it over
    let mut probe = Pipeline::new(ScriptedDetector::new().0, config.clone()).unwrap();
    let probe_out = probe.run(&video(), 24.0, Some(court())).unwrap();
    let red_b = player_at(&probe_out.tracks, 0, PLAYERS[2].0);
    let blue_a = player_at(&probe_out.tracks, 0, PLAYERS[1].0);
    let blue_team = probe_out.tracks.player(0, blue_a).unwrap().team().unwrap();

    config.team.overrides.push(pitchtrack::team::TeamOverride {
        track_id: red_b,
        team: blue_team,
    });
    let mut pipeline = Pipeline::new(detector, config).unwrap();
    let output = pipeline.run(&video(), 24.0, Some(court())).unwrap();
    for frame in 0..FRAMES {
        assert_eq!(output.tracks.player(frame, red_b).unwrap().team(), Some(blue_team));
    }
}

#[test]
fn test_cached_tracks_skip_detection() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("tracks.json");

    let (detector, calls) = ScriptedDetector::new();
    let mut first = Pipeline::new(detector, PipelineConfig::default())
        .unwrap()
        .with_cache(TrackCache::new(&cache_path));
    let first_out = first.run(&video(), 24.0, Some(court())).unwrap();
    assert_eq!(calls.get(), FRAMES);
    assert!(cache_path.exists());

    let (detector, calls) = ScriptedDetector::new();
    let mut second = Pipeline::new(detector, PipelineConfig::default())
        .unwrap()
        .with_cache(TrackCache::new(&cache_path));
    let second_out = second.run(&video(), 24.0, Some(court())).unwrap();
    assert_eq!(calls.get(), 0);
    assert_eq!(second_out.tracks, first_out.tracks);
    assert_eq!(second_out.team_ball_control, first_out.team_ball_control);

    // another frame rate changes the tracker parameters: cache miss
    let (detector, calls) = ScriptedDetector::new();
    let mut third = Pipeline::new(detector, PipelineConfig::default())
        .unwrap()
        .with_cache(TrackCache::new(&cache_path));
    third.run(&video(), 30.0, Some(court())).unwrap();
    assert_eq!(calls.get(), FRAMES);
}

#[test]
fn test_cache_misses_for_another_clip() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("tracks.json");

    let (detector, _) = ScriptedDetector::new();
    Pipeline::new(detector, PipelineConfig::default())
        .unwrap()
        .with_cache(TrackCache::new(&cache_path))
        .run(&video(), 24.0, Some(court()))
        .unwrap();

    // same length and size, different pixels
    let mut other = video();
    for frame in &mut other {
        paint_shirt(frame, person_box(120.0, 170.0, 0), YELLOW);
    }
    let (detector, calls) = ScriptedDetector::new();
    Pipeline::new(detector, PipelineConfig::default())
        .unwrap()
        .with_cache(TrackCache::new(&cache_path))
        .run(&other, 24.0, Some(court()))
        .unwrap();
    assert_eq!(calls.get(), FRAMES);
}

struct MarkBallHolder;

impl FrameRenderer for MarkBallHolder {
    fn render(
        &mut self,
        frames: &[RgbImage],
        tracks: &Tracks,
        _team_ball_control: &TeamBallControl,
        _camera_movement: &[Vector2<f32>],
    ) -> Vec<RgbImage> {
        frames
            .iter()
            .zip(tracks.players())
            .map(|(frame, players)| {
                let mut frame = frame.clone();
                for record in players.values().filter(|r| r.has_ball()) {
                    let bbox = record.bbox();
                    frame.put_pixel(bbox.x as u32, bbox.y as u32, Rgb([255, 255, 255]));
                }
                frame
            })
            .collect()
    }
}

#[test]
fn test_renderer_output_replaces_frames() {
    let (detector, _) = ScriptedDetector::new();
    let mut pipeline = Pipeline::new(detector, PipelineConfig::default())
        .unwrap()
        .with_renderer(MarkBallHolder);
    let frames = video();
    let output = pipeline.run(&frames, 24.0, Some(court())).unwrap();

    assert_eq!(output.frames.len(), FRAMES);
    assert_ne!(output.frames, frames);
    let [x, y, _, _] = person_box(PLAYERS[0].0, PLAYERS[0].1, 0);
    assert_eq!(*output.frames[0].get_pixel(x as u32, y as u32), Rgb([255, 255, 255]));
}
