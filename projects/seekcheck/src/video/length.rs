use crate::error::{VideoError, VideoResult};
use crate::video::Decoder;
use std::path::Path;
use std::process::Command;

/// Where a reader gets its frame count from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthSource {
    /// Count decodable frames with `ffprobe -count_frames`, falling back to
    /// container metadata when ffprobe is unavailable or fails.
    #[default]
    Ffprobe,
    /// Trust container metadata.
    Metadata,
}

impl LengthSource {
    pub fn probe<D: Decoder>(&self, path: &Path, decoder: &D) -> VideoResult<usize> {
        match self {
            LengthSource::Metadata => metadata_length(decoder),
            LengthSource::Ffprobe => match ffprobe_frame_count(path) {
                Ok(count) => Ok(count),
                Err(e) => {
                    tracing::warn!(
                        "ffprobe could not count frames in {:?} ({}), using backend metadata to infer a likely wrong frame count",
                        path,
                        e
                    );
                    metadata_length(decoder)
                }
            },
        }
    }
}

fn metadata_length<D: Decoder>(decoder: &D) -> VideoResult<usize> {
    decoder
        .reported_frame_count()?
        .ok_or_else(|| VideoError::Probe("backend does not report a frame count".to_string()))
}

/// Exact count of decodable frames in the first video stream.
pub fn ffprobe_frame_count(path: &Path) -> VideoResult<usize> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-count_frames",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=nb_read_frames",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| VideoError::Probe(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(VideoError::Probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_frame_count(&String::from_utf8_lossy(&output.stdout))
}

fn parse_frame_count(stdout: &str) -> VideoResult<usize> {
    let text = stdout.trim();
    text.parse::<usize>()
        .map_err(|_| VideoError::Probe(format!("unexpected ffprobe output {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::synthetic::{SyntheticBackend, SyntheticVideo};
    use crate::video::Backend;

    #[test]
    fn test_parse_frame_count() {
        assert_eq!(parse_frame_count("132\n").unwrap(), 132);
        assert!(parse_frame_count("N/A\n").is_err());
        assert!(parse_frame_count("").is_err());
    }

    #[test]
    fn test_metadata_uses_reported_count() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(13).reporting_frames(15));
        let decoder = backend.open(Path::new("lying.avi")).unwrap();
        let length = LengthSource::Metadata
            .probe(Path::new("lying.avi"), &decoder)
            .unwrap();
        assert_eq!(length, 15);
    }

    #[test]
    fn test_ffprobe_falls_back_to_metadata() {
        // Not a real file, so ffprobe fails (or is missing) either way.
        let backend = SyntheticBackend::new(SyntheticVideo::new(13));
        let path = Path::new("/nonexistent/seekcheck/clip.avi");
        let decoder = backend.open(path).unwrap();
        assert_eq!(LengthSource::Ffprobe.probe(path, &decoder).unwrap(), 13);
    }
}
