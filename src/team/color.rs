//! Jersey color extraction from a player crop.

use image::{RgbImage, imageops};
use ndarray::Array2;
use rand::rngs::StdRng;

use super::Color;
use super::kmeans::{KMeans, KMeansParams};
use crate::tracker::Rect;

/// Extracts one representative jersey color per player box.
///
/// The box is cropped from the frame and only its top half is kept, which
/// drops shorts and most of the grass. The remaining pixels are split into
/// two color clusters; the cluster owning the majority of the four crop
/// corners is taken as background and the other one as the jersey.
#[derive(Debug, Clone, Copy)]
pub struct ColorExtractor {
    params: KMeansParams,
}

impl ColorExtractor {
    pub fn new(n_init: usize, max_iter: usize, tol: f32) -> Self {
        Self {
            params: KMeansParams {
                k: 2,
                n_init,
                max_iter,
                tol,
            },
        }
    }

    /// Returns `None` when the box does not cover any pixel of the frame.
    pub fn player_color(&self, frame: &RgbImage, bbox: &Rect, rng: &mut StdRng) -> Option<Color> {
        let crop = top_half_crop(frame, bbox)?;
        let (width, height) = crop.dimensions();

        let pixels = Array2::from_shape_fn((crop.len() / 3, 3), |(i, c)| {
            f32::from(crop.as_raw()[i * 3 + c])
        });

        let Some(model) = KMeans::fit(pixels.view(), &self.params, rng) else {
            // a single pixel is its own color
            let p = pixels.row(0);
            return Some([p[0], p[1], p[2]]);
        };

        let labels = model.labels(pixels.view());
        let at = |x: u32, y: u32| labels[(y * width + x) as usize];
        let corners = [
            at(0, 0),
            at(width - 1, 0),
            at(0, height - 1),
            at(width - 1, height - 1),
        ];
        let background_votes = corners.iter().filter(|&&l| l == 1).count();
        // ties keep cluster 0 as background
        let background = usize::from(background_votes > 2);
        let jersey = model.centroid(1 - background);

        Some([jersey[0], jersey[1], jersey[2]])
    }
}

/// Crop the box out of the frame, clamped to the image, then keep its top half.
fn top_half_crop(frame: &RgbImage, bbox: &Rect) -> Option<RgbImage> {
    let [x1, y1, x2, y2] = bbox.to_tlbr();
    let (fw, fh) = frame.dimensions();

    let x1 = (x1.max(0.0) as u32).min(fw);
    let y1 = (y1.max(0.0) as u32).min(fh);
    let x2 = (x2.max(0.0) as u32).min(fw);
    let y2 = (y2.max(0.0) as u32).min(fh);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let height = y2 - y1;
    let top = (height / 2).max(1);
    Some(imageops::crop_imm(frame, x1, y1, x2 - x1, top).to_image())
}
