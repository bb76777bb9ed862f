//! Pyramidal Lucas-Kanade point tracking.

use image::GrayImage;
use nalgebra::{Matrix2, Point2, Vector2};
use ndarray::Array2;

use super::features::min_eigenvalue;

/// Per-pixel minimum eigenvalue of the window gradient matrix below which a
/// point has too little texture to track.
const MIN_EIGEN_THRESHOLD: f32 = 1e-3;

/// Image pyramid; level 0 is full resolution, each level above halves both
/// dimensions.
#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<Array2<f32>>,
}

impl Pyramid {
    pub fn new(image: &GrayImage, max_level: usize) -> Self {
        let (width, height) = image.dimensions();
        let base = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            f32::from(image.get_pixel(x as u32, y as u32)[0])
        });

        let mut levels = vec![base];
        for _ in 0..max_level {
            let Some(prev) = levels.last() else { break };
            let (h, w) = prev.dim();
            if h < 2 || w < 2 {
                break;
            }
            let next = Array2::from_shape_fn((h / 2, w / 2), |(y, x)| {
                let (y, x) = (2 * y, 2 * x);
                (prev[[y, x]] + prev[[y, x + 1]] + prev[[y + 1, x]] + prev[[y + 1, x + 1]]) * 0.25
            });
            levels.push(next);
        }
        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> &Array2<f32> {
        &self.levels[level]
    }
}

/// Bilinear sample, clamped to the image border.
fn sample(image: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = image.dim();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let top = image[[y0, x0]] * (1.0 - fx) + image[[y0, x1]] * fx;
    let bottom = image[[y1, x0]] * (1.0 - fx) + image[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Coarse-to-fine Lucas-Kanade tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidalLk {
    pub window: usize,
    pub max_level: usize,
    pub iterations: usize,
    /// Stop refining a level once the update is shorter than this
    pub epsilon: f32,
}

impl PyramidalLk {
    pub fn pyramid(&self, image: &GrayImage) -> Pyramid {
        Pyramid::new(image, self.max_level)
    }

    /// New location of each point in `next`, or `None` where the point could
    /// not be followed.
    pub fn track(
        &self,
        prev: &Pyramid,
        next: &Pyramid,
        points: &[Point2<f32>],
    ) -> Vec<Option<Point2<f32>>> {
        points.iter().map(|&p| self.track_point(prev, next, p)).collect()
    }

    fn track_point(
        &self,
        prev: &Pyramid,
        next: &Pyramid,
        point: Point2<f32>,
    ) -> Option<Point2<f32>> {
        let levels = prev.num_levels().min(next.num_levels());
        let half = (self.window / 2) as i32;
        let mut guess = Vector2::<f32>::zeros();

        for level in (0..levels).rev() {
            let scale = (1u32 << level) as f32;
            let template = prev.level(level);
            let target = next.level(level);
            let center = point.coords / scale;

            let mut patch = Vec::with_capacity(self.window * self.window);
            let mut gradient = Matrix2::<f32>::zeros();
            for dy in -half..=half {
                for dx in -half..=half {
                    let x = center.x + dx as f32;
                    let y = center.y + dy as f32;
                    let ix = (sample(template, x + 1.0, y) - sample(template, x - 1.0, y)) * 0.5;
                    let iy = (sample(template, x, y + 1.0) - sample(template, x, y - 1.0)) * 0.5;
                    gradient += Matrix2::new(ix * ix, ix * iy, ix * iy, iy * iy);
                    patch.push((x, y, ix, iy, sample(template, x, y)));
                }
            }

            let n = patch.len() as f32;
            let min_eig = min_eigenvalue(gradient[(0, 0)], gradient[(0, 1)], gradient[(1, 1)]) / n;
            if min_eig < MIN_EIGEN_THRESHOLD {
                return None;
            }
            let inverse = gradient.try_inverse()?;

            let mut flow = Vector2::<f32>::zeros();
            for _ in 0..self.iterations.max(1) {
                let offset = guess + flow;
                let mut mismatch = Vector2::<f32>::zeros();
                for &(x, y, ix, iy, value) in &patch {
                    let diff = value - sample(target, x + offset.x, y + offset.y);
                    mismatch += Vector2::new(diff * ix, diff * iy);
                }
                let step = inverse * mismatch;
                flow += step;
                if step.norm() < self.epsilon {
                    break;
                }
            }

            guess = if level > 0 { (guess + flow) * 2.0 } else { guess + flow };
        }

        let tracked = point + guess;
        let (h, w) = next.level(0).dim();
        let inside = tracked.x >= 0.0
            && tracked.y >= 0.0
            && tracked.x <= (w - 1) as f32
            && tracked.y <= (h - 1) as f32;
        inside.then_some(tracked)
    }
}
