//! Shi-Tomasi corner selection.

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use nalgebra::Point2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureParams {
    pub max_corners: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    /// Side of the window the gradient covariance is summed over
    pub block_size: u32,
}

/// Smaller eigenvalue of the symmetric matrix `[[a, b], [b, c]]`.
pub(crate) fn min_eigenvalue(a: f32, b: f32, c: f32) -> f32 {
    let half_trace = (a + c) * 0.5;
    let half_diff = (a - c) * 0.5;
    half_trace - (half_diff * half_diff + b * b).sqrt()
}

/// Pick up to `max_corners` strong corners among the pixels accepted by
/// `mask`, strongest first.
///
/// A pixel qualifies when its minimum-eigenvalue response is a local maximum
/// and reaches `quality_level` times the best response in the mask. Corners
/// closer than `min_distance` to a stronger corner are discarded.
pub fn good_features_to_track(
    image: &GrayImage,
    params: &FeatureParams,
    mask: impl Fn(u32, u32) -> bool,
) -> Vec<Point2<f32>> {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 || params.max_corners == 0 {
        return Vec::new();
    }

    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let half = i64::from(params.block_size.max(1) / 2);
    let idx = |x: u32, y: u32| (y * width + x) as usize;

    let mut response = vec![0.0f32; (width * height) as usize];
    let mut best = 0.0f32;
    for y in 0..height {
        for x in 0..width {
            if !mask(x, y) {
                continue;
            }
            let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
            for dy in -half..=half {
                for dx in -half..=half {
                    let sx = (i64::from(x) + dx).clamp(0, i64::from(width) - 1) as u32;
                    let sy = (i64::from(y) + dy).clamp(0, i64::from(height) - 1) as u32;
                    let ix = f32::from(gx.get_pixel(sx, sy)[0]);
                    let iy = f32::from(gy.get_pixel(sx, sy)[0]);
                    a += ix * ix;
                    b += ix * iy;
                    c += iy * iy;
                }
            }
            let lambda = min_eigenvalue(a, b, c);
            response[idx(x, y)] = lambda;
            best = best.max(lambda);
        }
    }
    if best <= 0.0 {
        return Vec::new();
    }

    let threshold = best * params.quality_level;
    let mut candidates = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let r = response[idx(x, y)];
            if r <= 0.0 || r < threshold || !mask(x, y) {
                continue;
            }
            let is_peak = (y.saturating_sub(1)..=(y + 1).min(height - 1)).all(|ny| {
                (x.saturating_sub(1)..=(x + 1).min(width - 1)).all(|nx| response[idx(nx, ny)] <= r)
            });
            if is_peak {
                candidates.push((Point2::new(x as f32, y as f32), r));
            }
        }
    }
    // stable: equal responses stay in row-major order
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let min_dist_sq = params.min_distance * params.min_distance;
    let mut corners: Vec<Point2<f32>> = Vec::new();
    for (p, _) in candidates {
        if corners.iter().all(|&q| (q - p).norm_squared() >= min_dist_sq) {
            corners.push(p);
            if corners.len() == params.max_corners {
                break;
            }
        }
    }
    corners
}
