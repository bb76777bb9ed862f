//! On-disk cache of raw tracking results.
//!
//! Detection and tracking dominate the cost of a run. Their output can be
//! stored as JSON and reused as long as the video, the detector and the
//! tracker are unchanged, which the caller expresses as a fingerprint string.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::Result;
use crate::tracker::TrackerConfig;
use crate::tracks::Tracks;

/// Bumped whenever the stored layout of [`Tracks`] changes.
pub const CACHE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EntryRef<'a> {
    version: u32,
    fingerprint: &'a str,
    tracks: &'a Tracks,
}

#[derive(Deserialize)]
struct Entry {
    version: u32,
    fingerprint: String,
    tracks: Tracks,
}

/// Fingerprint of a video, the detector run on it and the tracker
/// parameters its output was tracked with.
pub fn fingerprint(detector: &str, tracker: &TrackerConfig, frames: &[RgbImage]) -> Result<String> {
    Ok(format!(
        "{detector}|{}|{}",
        serde_json::to_string(tracker)?,
        video_digest(frames)
    ))
}

/// SHA-256 over the frame count, the frame size and the pixels of the first
/// and last frames.
fn video_digest(frames: &[RgbImage]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((frames.len() as u64).to_le_bytes());
    if let (Some(first), Some(last)) = (frames.first(), frames.last()) {
        let (width, height) = first.dimensions();
        hasher.update(width.to_le_bytes());
        hasher.update(height.to_le_bytes());
        hasher.update(first.as_raw());
        hasher.update(last.as_raw());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct TrackCache {
    path: PathBuf,
}

impl TrackCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached tracks for `fingerprint`.
    ///
    /// A missing file, another format version or another fingerprint is a
    /// miss. A file that cannot be read or parsed is an error.
    pub fn load(&self, fingerprint: &str) -> Result<Option<Tracks>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no track cache");
            return Ok(None);
        }

        let entry: Entry = serde_json::from_reader(BufReader::new(File::open(&self.path)?))?;
        if entry.version != CACHE_VERSION {
            info!(
                found = entry.version,
                expected = CACHE_VERSION,
                "track cache version changed, ignoring"
            );
            return Ok(None);
        }
        if entry.fingerprint != fingerprint {
            info!(path = %self.path.display(), "track cache is stale, ignoring");
            return Ok(None);
        }

        debug!(path = %self.path.display(), frames = entry.tracks.len(), "track cache hit");
        Ok(Some(entry.tracks))
    }

    pub fn store(&self, fingerprint: &str, tracks: &Tracks) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(
            &mut writer,
            &EntryRef {
                version: CACHE_VERSION,
                fingerprint,
                tracks,
            },
        )?;
        writer.flush()?;

        debug!(path = %self.path.display(), frames = tracks.len(), "track cache stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tracker::Rect;

    fn sample_tracks() -> Tracks {
        let mut tracks = Tracks::new(3);
        tracks.insert_player(0, 4, Rect::from_tlbr(1.0, 2.0, 11.0, 32.0));
        tracks.insert_referee(1, 9, Rect::from_tlbr(50.0, 2.0, 60.0, 32.0));
        tracks.insert_ball(2, Rect::from_tlbr(20.0, 20.0, 24.0, 24.0));
        tracks
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TrackCache::new(dir.path().join("cache").join("tracks.json"));
        let tracks = sample_tracks();

        assert!(cache.load("yolo").unwrap().is_none());
        cache.store("yolo", &tracks).unwrap();
        assert_eq!(cache.load("yolo").unwrap(), Some(tracks));
    }

    #[test]
    fn test_fingerprint_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TrackCache::new(dir.path().join("tracks.json"));
        let frames = vec![RgbImage::new(8, 6); 3];
        let old = fingerprint("yolo", &TrackerConfig::default(), &frames).unwrap();
        cache.store(&old, &sample_tracks()).unwrap();

        let tuned = fingerprint(
            "yolo",
            &TrackerConfig {
                track_buffer: 60,
                ..TrackerConfig::default()
            },
            &frames,
        )
        .unwrap();
        assert_ne!(old, tuned);
        assert!(cache.load(&tuned).unwrap().is_none());
        assert!(cache.load(&old).unwrap().is_some());
    }

    #[test]
    fn test_fingerprint_depends_on_video() {
        let config = TrackerConfig::default();
        let clip = vec![RgbImage::from_pixel(8, 6, image::Rgb([30, 140, 40])); 3];
        let mut other = clip.clone();
        other[0].put_pixel(2, 2, image::Rgb([255, 255, 255]));
        let larger = vec![RgbImage::from_pixel(8, 7, image::Rgb([30, 140, 40])); 3];

        let key = fingerprint("yolo", &config, &clip).unwrap();
        assert_eq!(key, fingerprint("yolo", &config, &clip.clone()).unwrap());
        assert_ne!(key, fingerprint("yolo", &config, &other).unwrap());
        assert_ne!(key, fingerprint("yolo", &config, &larger).unwrap());
        assert_ne!(key, fingerprint("yolo", &config, &clip[..2]).unwrap());
    }

    #[test]
    fn test_old_version_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.json");
        let entry = serde_json::json!({
            "version": CACHE_VERSION + 1,
            "fingerprint": "yolo",
            "tracks": sample_tracks(),
        });
        fs::write(&path, entry.to_string()).unwrap();
        assert!(TrackCache::new(path).load("yolo").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(TrackCache::new(path).load("yolo"), Err(Error::CacheFormat(_))));
    }
}
