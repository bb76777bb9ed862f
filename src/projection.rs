//! Pixel to pitch projection.
//!
//! Four pixel points outlining a visible stretch of the pitch are mapped to
//! a rectangle measured in meters. Points outside the pixel quadrilateral
//! have no pitch coordinate.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::tracks::{Stage, Tracks};

/// Reference quadrilateral of the court, fixed for a whole video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtGeometry {
    /// Bottom-left, top-left, top-right, bottom-right, in pixels
    pub pixel_vertices: [[f32; 2]; 4],
    /// Meters, across the pitch
    pub court_width: f32,
    /// Meters, along the pitch
    pub court_length: f32,
}

impl Default for CourtGeometry {
    fn default() -> Self {
        Self {
            pixel_vertices: [[110.0, 1035.0], [265.0, 275.0], [910.0, 260.0], [1640.0, 915.0]],
            court_width: 68.0,
            court_length: 23.32,
        }
    }
}

impl CourtGeometry {
    /// Pitch coordinates of the pixel vertices, in the same order.
    pub fn target_vertices(&self) -> [[f32; 2]; 4] {
        let (w, l) = (self.court_width, self.court_length);
        [[0.0, w], [0.0, 0.0], [l, 0.0], [l, w]]
    }
}

/// Planar projective transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    /// Solve the transform taking each `src` point onto the matching `dst`
    /// point. `None` when the correspondences do not determine one.
    pub fn from_correspondences(src: &[[f32; 2]; 4], dst: &[[f32; 2]; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst).enumerate() {
            let (x, y) = (f64::from(s[0]), f64::from(s[1]));
            let (u, v) = (f64::from(d[0]), f64::from(d[1]));
            let r = 2 * i;
            a.row_mut(r).copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
            a.row_mut(r + 1).copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
            b[r] = u;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|c| !c.is_finite()) {
            return None;
        }
        Some(Self(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0)))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// `None` for points mapped to infinity.
    pub fn apply(&self, point: Point2<f32>) -> Option<Point2<f32>> {
        let p = self.0 * Vector3::new(f64::from(point.x), f64::from(point.y), 1.0);
        if p.z.abs() < f64::EPSILON {
            return None;
        }
        Some(Point2::new((p.x / p.z) as f32, (p.y / p.z) as f32))
    }
}

/// Maps camera-stabilized pixel positions onto the pitch.
#[derive(Debug, Clone)]
pub struct ViewTransformer {
    geometry: CourtGeometry,
    homography: Homography,
}

impl ViewTransformer {
    /// Fails with [`Error::DegenerateCourt`] when three pixel vertices are
    /// collinear or the court has no area.
    pub fn new(geometry: CourtGeometry) -> Result<Self> {
        let sized = geometry.court_width.is_finite()
            && geometry.court_length.is_finite()
            && geometry.court_width > 0.0
            && geometry.court_length > 0.0;
        if !sized || has_collinear_vertices(&geometry.pixel_vertices) {
            return Err(Error::DegenerateCourt);
        }

        let homography =
            Homography::from_correspondences(&geometry.pixel_vertices, &geometry.target_vertices())
                .ok_or(Error::DegenerateCourt)?;
        Ok(Self {
            geometry,
            homography,
        })
    }

    pub fn geometry(&self) -> &CourtGeometry {
        &self.geometry
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Pitch position of a pixel point, `None` off the court.
    ///
    /// The containment test runs on the pixel the point falls in, and
    /// points on the outline count as inside.
    pub fn transform_point(&self, point: Point2<f32>) -> Option<Point2<f32>> {
        let pixel = [f64::from(point.x.trunc()), f64::from(point.y.trunc())];
        if !contains(&self.geometry.pixel_vertices, pixel) {
            return None;
        }
        self.homography.apply(point)
    }

    /// Fill `position_transformed` from `position_adjusted` on every record.
    pub fn add_transformed_positions(&self, tracks: &mut Tracks) -> Result<()> {
        tracks.require(Stage::Projected)?;

        let (mut projected, mut off_court) = (0usize, 0usize);
        tracks.for_each_record_mut(|_, record| {
            let Some(adjusted) = record.position_adjusted() else {
                return;
            };
            match self.transform_point(adjusted) {
                Some(position) => {
                    record.fill_position_transformed(position);
                    projected += 1;
                }
                None => off_court += 1,
            }
        });

        info!(projected, off_court, "court projection complete");
        tracks.complete(Stage::Projected);
        Ok(())
    }
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn to_f64(v: [f32; 2]) -> [f64; 2] {
    [f64::from(v[0]), f64::from(v[1])]
}

fn has_collinear_vertices(vertices: &[[f32; 2]; 4]) -> bool {
    let v = vertices.map(to_f64);
    (0..4).any(|skip| {
        let [a, b, c] = [(skip + 1) % 4, (skip + 2) % 4, (skip + 3) % 4].map(|i| v[i]);
        cross(a, b, c).abs() < 1e-9
    })
}

/// Even-odd containment with the outline counted as inside.
fn contains(vertices: &[[f32; 2]; 4], p: [f64; 2]) -> bool {
    let v = vertices.map(to_f64);
    let mut inside = false;
    for i in 0..v.len() {
        let a = v[i];
        let b = v[(i + 1) % v.len()];

        let on_line = cross(a, b, p).abs() < 1e-9;
        let within = p[0] >= a[0].min(b[0])
            && p[0] <= a[0].max(b[0])
            && p[1] >= a[1].min(b[1])
            && p[1] <= a[1].max(b[1]);
        if on_line && within {
            return true;
        }

        if (a[1] > p[1]) != (b[1] > p[1]) {
            let x_cross = a[0] + (p[1] - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
            if p[0] < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}
