use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::team::{Color, Team};
use crate::tracker::Rect;

/// State of one tracked entity in one frame.
///
/// Fields other than the box are filled by later stages. Each `fill_*`
/// setter writes only into an empty field and returns whether it wrote, so a
/// stage can never overwrite what an earlier stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    bbox: Rect,
    position: Option<Point2<f32>>,
    position_adjusted: Option<Point2<f32>>,
    /// Pitch coordinates in meters; stays `None` off the court
    position_transformed: Option<Point2<f32>>,
    /// km/h
    speed: Option<f32>,
    /// Cumulative meters
    distance: Option<f32>,
    team: Option<Team>,
    team_color: Option<Color>,
    has_ball: bool,
}

impl TrackRecord {
    pub fn new(bbox: Rect) -> Self {
        Self {
            bbox,
            position: None,
            position_adjusted: None,
            position_transformed: None,
            speed: None,
            distance: None,
            team: None,
            team_color: None,
            has_ball: false,
        }
    }

    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    pub fn position(&self) -> Option<Point2<f32>> {
        self.position
    }

    pub fn position_adjusted(&self) -> Option<Point2<f32>> {
        self.position_adjusted
    }

    pub fn position_transformed(&self) -> Option<Point2<f32>> {
        self.position_transformed
    }

    pub fn speed(&self) -> Option<f32> {
        self.speed
    }

    pub fn distance(&self) -> Option<f32> {
        self.distance
    }

    pub fn team(&self) -> Option<Team> {
        self.team
    }

    pub fn team_color(&self) -> Option<Color> {
        self.team_color
    }

    pub fn has_ball(&self) -> bool {
        self.has_ball
    }

    pub fn fill_position(&mut self, position: Point2<f32>) -> bool {
        fill(&mut self.position, position)
    }

    pub fn fill_position_adjusted(&mut self, position: Point2<f32>) -> bool {
        fill(&mut self.position_adjusted, position)
    }

    pub fn fill_position_transformed(&mut self, position: Point2<f32>) -> bool {
        fill(&mut self.position_transformed, position)
    }

    /// Speed and cumulative distance are always written together.
    pub fn fill_motion(&mut self, speed_kmh: f32, distance_m: f32) -> bool {
        if self.speed.is_some() || self.distance.is_some() {
            return false;
        }
        self.speed = Some(speed_kmh);
        self.distance = Some(distance_m);
        true
    }

    pub fn fill_team(&mut self, team: Team, color: Color) -> bool {
        if self.team.is_some() {
            return false;
        }
        self.team = Some(team);
        self.team_color = Some(color);
        true
    }

    pub fn mark_has_ball(&mut self) -> bool {
        !std::mem::replace(&mut self.has_ball, true)
    }
}

fn fill<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_set_once() {
        let mut record = TrackRecord::new(Rect::from_tlbr(0.0, 0.0, 10.0, 20.0));
        assert!(record.fill_position(Point2::new(5.0, 20.0)));
        assert!(!record.fill_position(Point2::new(0.0, 0.0)));
        assert_eq!(record.position(), Some(Point2::new(5.0, 20.0)));

        assert!(record.fill_team(Team::Two, [1.0, 2.0, 3.0]));
        assert!(!record.fill_team(Team::One, [0.0, 0.0, 0.0]));
        assert_eq!(record.team(), Some(Team::Two));
        assert_eq!(record.team_color(), Some([1.0, 2.0, 3.0]));

        assert!(record.fill_motion(10.0, 2.0));
        assert!(!record.fill_motion(20.0, 4.0));
        assert_eq!(record.speed(), Some(10.0));

        assert!(record.mark_has_ball());
        assert!(!record.mark_has_ball());
        assert!(record.has_ball());
    }
}
