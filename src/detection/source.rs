//! Trait for object detection inference backends.

use std::fmt::Display;

use image::RgbImage;
use tracing::debug;

use super::Detection;
use crate::error::{Error, Result};

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline.
///
/// # Example
///
/// ```ignore
/// use pitchtrack::{Detection, DetectionSource};
/// use image::RgbImage;
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error: Display;

    /// Run inference on one frame.
    fn detect(&mut self, frame: &RgbImage) -> std::result::Result<Vec<Detection>, Self::Error>;

    /// Run inference on a batch of consecutive frames.
    ///
    /// Backends that batch on an accelerator override this; the result must
    /// hold one entry per input frame, in input order.
    fn detect_batch(
        &mut self,
        frames: &[RgbImage],
    ) -> std::result::Result<Vec<Vec<Detection>>, Self::Error> {
        frames.iter().map(|frame| self.detect(frame)).collect()
    }

    /// Number of frames handed to [`DetectionSource::detect_batch`] at once.
    fn batch_size(&self) -> usize {
        20
    }

    /// Identifies the model and its parameters. Cached tracking results are
    /// only reused when this string is unchanged.
    fn fingerprint(&self) -> String {
        String::new()
    }
}

/// Run the detector over every frame in batches, preserving frame order.
pub fn detect_frames<D: DetectionSource + ?Sized>(
    source: &mut D,
    frames: &[RgbImage],
) -> Result<Vec<Vec<Detection>>> {
    let batch_size = source.batch_size().max(1);
    let mut detections = Vec::with_capacity(frames.len());

    for (batch_idx, batch) in frames.chunks(batch_size).enumerate() {
        let mut batch_detections = source
            .detect_batch(batch)
            .map_err(|e| Error::Detection(e.to_string()))?;
        if batch_detections.len() != batch.len() {
            return Err(Error::Detection(format!(
                "batch {} returned {} results for {} frames",
                batch_idx,
                batch_detections.len(),
                batch.len()
            )));
        }
        debug!(batch = batch_idx, frames = batch.len(), "detected batch");
        detections.append(&mut batch_detections);
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ObjectClass;

    struct CountingDetector {
        calls: usize,
    }

    impl DetectionSource for CountingDetector {
        type Error = std::convert::Infallible;

        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> std::result::Result<Vec<Detection>, Self::Error> {
            self.calls += 1;
            let x = self.calls as f32 * 10.0;
            Ok(vec![Detection::new(x, 0.0, x + 5.0, 5.0, 0.9, ObjectClass::Ball)])
        }

        fn batch_size(&self) -> usize {
            3
        }
    }

    struct ShortBatchDetector;

    impl DetectionSource for ShortBatchDetector {
        type Error = String;

        fn detect(
            &mut self,
            _frame: &RgbImage,
        ) -> std::result::Result<Vec<Detection>, Self::Error> {
            Ok(vec![])
        }

        fn detect_batch(
            &mut self,
            _frames: &[RgbImage],
        ) -> std::result::Result<Vec<Vec<Detection>>, Self::Error> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_detect_frames_preserves_order() {
        let frames = vec![RgbImage::new(4, 4); 7];
        let mut detector = CountingDetector { calls: 0 };
        let detections = detect_frames(&mut detector, &frames).unwrap();

        assert_eq!(detections.len(), 7);
        for (i, dets) in detections.iter().enumerate() {
            assert_eq!(dets[0].bbox.x, (i + 1) as f32 * 10.0);
        }
    }

    #[test]
    fn test_short_batch_is_an_error() {
        let frames = vec![RgbImage::new(4, 4); 2];
        let result = detect_frames(&mut ShortBatchDetector, &frames);
        assert!(matches!(result, Err(Error::Detection(_))));
    }
}
