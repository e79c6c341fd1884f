//! On-disk store of precomputed ground truths, keyed by video file name.
//!
//! Cached digests assume decoding is bit-accurate, which does not hold across
//! decoder libraries or versions. That drift is exactly what comparing
//! `precomputed` against `online` expectations exposes, so it is logged rather
//! than hidden.

use super::{GroundTruth, GroundTruthComputer};
use crate::video::Backend;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Read from and write to the cache file.
    pub use_cache: bool,
    /// Recompute even if the cache file exists.
    pub recompute: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            use_cache: true,
            recompute: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroundTruthCache {
    path: PathBuf,
    entries: BTreeMap<String, GroundTruth>,
}

/// Cache key for a video: its file name.
pub fn cache_key(video: &Path) -> String {
    video
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| video.to_string_lossy().into_owned())
}

impl GroundTruthCache {
    /// Empty cache that will be written to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    /// Load `path`, or start empty if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("GroundTruthCache: {:?} does not exist yet", path);
            return Ok(Self::new(path));
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ground truth cache {:?}", path))?;
        let entries: BTreeMap<String, GroundTruth> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ground truth cache {:?}", path))?;
        tracing::warn!(
            "GroundTruthCache: loaded {} videos from {:?}; precomputed digests assume bit-accurate decoding and may be stale for this decoder version",
            entries.len(),
            path
        );
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write ground truth cache {:?}", self.path))?;
        tracing::info!(
            "GroundTruthCache: stored {} videos in {:?}",
            self.entries.len(),
            self.path
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&GroundTruth> {
        self.entries.get(key)
    }

    pub fn get_video(&self, video: &Path) -> Option<&GroundTruth> {
        self.get(&cache_key(video))
    }

    pub fn insert(&mut self, key: String, truth: GroundTruth) {
        self.entries.insert(key, truth);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load the cache, or compute every video when caching is off, a
    /// recompute is forced, or the file is missing. Freshly computed
    /// expectations are stored when caching is on.
    pub fn resolve<B: Backend>(
        path: &Path,
        videos: &[PathBuf],
        policy: CachePolicy,
        computer: &GroundTruthComputer<'_, B>,
    ) -> Result<Self> {
        if policy.use_cache && !policy.recompute && path.is_file() {
            return Self::load(path);
        }

        let mut cache = Self::new(path);
        for video in videos {
            let truth = computer
                .compute(video)
                .with_context(|| format!("Failed to compute ground truth for {:?}", video))?;
            cache.insert(cache_key(video), truth);
        }
        if policy.use_cache {
            cache.save()?;
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::synthetic::{SyntheticBackend, SyntheticVideo};
    use crate::video::LengthSource;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_hashes.json");
        let backend = SyntheticBackend::new(SyntheticVideo::new(8));
        let computer = GroundTruthComputer::new(&backend).length_source(LengthSource::Metadata);

        let mut cache = GroundTruthCache::new(&path);
        cache.insert(
            "clip.avi".to_string(),
            computer.compute(Path::new("clip.avi")).unwrap(),
        );
        cache.save().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw["clip.avi"]["3"].as_str().unwrap(),
            backend.video().render(3).digest().to_string()
        );

        let loaded = GroundTruthCache::load(&path).unwrap();
        assert_eq!(loaded.get("clip.avi"), cache.get("clip.avi"));
        assert_eq!(
            loaded.get_video(Path::new("/videos/clip.avi")).unwrap().len(),
            8
        );
    }

    #[test]
    fn test_resolve_computes_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("frame_hashes.json");
        let backend = SyntheticBackend::new(SyntheticVideo::new(5));
        let computer = GroundTruthComputer::new(&backend).length_source(LengthSource::Metadata);
        let videos = vec![PathBuf::from("/videos/a.avi"), PathBuf::from("/videos/b.mp4")];

        let cache =
            GroundTruthCache::resolve(&path, &videos, CachePolicy::default(), &computer).unwrap();
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["a.avi", "b.mp4"]);
        assert!(path.is_file());
        let opens = backend.stats().opens();

        let again =
            GroundTruthCache::resolve(&path, &videos, CachePolicy::default(), &computer).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(backend.stats().opens(), opens);

        let forced = CachePolicy {
            use_cache: true,
            recompute: true,
        };
        GroundTruthCache::resolve(&path, &videos, forced, &computer).unwrap();
        assert_eq!(backend.stats().opens(), opens + 2);
    }

    #[test]
    fn test_resolve_without_cache_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_hashes.json");
        let backend = SyntheticBackend::new(SyntheticVideo::new(3));
        let computer = GroundTruthComputer::new(&backend).length_source(LengthSource::Metadata);
        let policy = CachePolicy {
            use_cache: false,
            recompute: false,
        };
        let cache =
            GroundTruthCache::resolve(&path, &[PathBuf::from("x.avi")], policy, &computer).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_load_rejects_bad_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_hashes.json");
        fs::write(&path, r#"{"clip.avi": {"0": "not-a-digest"}}"#).unwrap();
        assert!(GroundTruthCache::load(&path).is_err());
    }
}
