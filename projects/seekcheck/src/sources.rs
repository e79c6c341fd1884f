//! Resolving which local video files a run covers.

use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &["3gp", "avi", "mjpg", "mkv", "mov", "mp4", "mpg", "webm", "wmv"];

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| VIDEO_EXTENSIONS.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn list_videos(video_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(video_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_video(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Explicit paths plus everything under `video_root`, sorted and deduplicated.
/// Explicit paths must exist.
pub fn resolve_videos(explicit: &[PathBuf], video_root: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut videos = BTreeSet::new();
    for path in explicit {
        if !path.is_file() {
            return Err(anyhow!("Video file not found: {:?}", path));
        }
        videos.insert(path.clone());
    }
    if let Some(root) = video_root {
        if !root.is_dir() {
            return Err(anyhow!("Video root is not a directory: {:?}", root));
        }
        videos.extend(list_videos(root));
    }
    if videos.is_empty() {
        return Err(anyhow!("No videos given; pass paths or --video-root"));
    }
    Ok(videos.into_iter().collect())
}
