//! Matching utilities for multi-object tracking.

use ndarray::Array2;

use crate::tracker::strack::STrack;

/// IoU distance matrix between tracks and candidate detections.
///
/// Pairs of different tracked classes get the maximum cost of 1.0 so a
/// referee box can never continue a player identity.
pub fn iou_distance(tracks: &[STrack], detections: &[STrack]) -> Array2<f32> {
    let mut dists = Array2::ones((tracks.len(), detections.len()));
    for (i, t) in tracks.iter().enumerate() {
        let t_rect = t.rect();
        for (j, d) in detections.iter().enumerate() {
            if t.class == d.class {
                dists[[i, j]] = 1.0 - t_rect.iou(&d.rect());
            }
        }
    }
    dists
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost assignment with a gating threshold.
///
/// The padded square problem is solved with lapjv; assignments whose cost is
/// above `thresh` are reported as unmatched on both sides.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        padded[[i, j]] = f64::from(cost);
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Weight IoU similarity by detection confidence.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[STrack]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        let iou_sim = 1.0 - *cost;
        *cost = 1.0 - iou_sim * detections[j].score;
    }
}
