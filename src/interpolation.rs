//! Ball gap filling.
//!
//! Each TLBR coordinate of the ball box is treated as its own time series.
//! Gaps between two known samples are filled linearly, gaps after the last
//! sample hold its value, and gaps before the first sample take the first
//! known value.

use tracing::info;

use crate::error::Result;
use crate::tracker::Rect;
use crate::tracks::{Stage, TrackRecord, Tracks};

/// Fill every gap of a per-frame ball box sequence.
///
/// A sequence without any box is returned unchanged.
pub fn interpolate_ball_positions(boxes: &[Option<Rect>]) -> Vec<Option<Rect>> {
    let known: Vec<(usize, [f32; 4])> = boxes
        .iter()
        .enumerate()
        .filter_map(|(i, b)| b.map(|r| (i, r.to_tlbr())))
        .collect();

    let (Some(&(first_idx, first)), Some(&(_, last))) = (known.first(), known.last()) else {
        return boxes.to_vec();
    };

    let mut out = Vec::with_capacity(boxes.len());
    let mut next = 0;
    for i in 0..boxes.len() {
        while next < known.len() && known[next].0 < i {
            next += 1;
        }
        let coords = if i <= first_idx {
            first
        } else if next == known.len() {
            last
        } else if known[next].0 == i {
            known[next].1
        } else {
            let (i0, c0) = known[next - 1];
            let (i1, c1) = known[next];
            let t = (i - i0) as f32 / (i1 - i0) as f32;
            std::array::from_fn(|k| c0[k] + (c1[k] - c0[k]) * t)
        };
        out.push(Some(match boxes[i] {
            Some(rect) => rect,
            None => Rect::from_tlbr(coords[0], coords[1], coords[2], coords[3]),
        }));
    }
    out
}

impl Tracks {
    /// Give every frame a ball record, synthesising boxes for missed frames.
    pub fn interpolate_ball(&mut self) -> Result<()> {
        self.require(Stage::BallInterpolated)?;

        let boxes = self.ball_bboxes();
        let missing = boxes.iter().filter(|b| b.is_none()).count();
        let filled = interpolate_ball_positions(&boxes);

        for (slot, bbox) in self.ball_mut().iter_mut().zip(filled) {
            if slot.is_none() {
                *slot = bbox.map(TrackRecord::new);
            }
        }

        info!(frames = boxes.len(), filled = missing, "ball interpolation complete");
        self.complete(Stage::BallInterpolated);
        Ok(())
    }
}
