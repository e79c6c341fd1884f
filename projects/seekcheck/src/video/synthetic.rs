//! Deterministic in-memory backend.
//!
//! Frames are generated from their index, so every frame has distinct content.
//! The knobs reproduce the ways real backends misbehave: lying frame counts,
//! imprecise native seeks, positions that disagree with what was decoded and
//! garbage right after a seek.

use crate::error::{VideoError, VideoResult};
use crate::video::{Backend, Decoder, Frame, StreamInfo};
use std::path::Path;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    frames: usize,
    reported_frames: Option<usize>,
    width: u32,
    height: u32,
    fps: f64,
    seek_offset: isize,
    honest_position: bool,
    corrupt_after_seek: bool,
}

impl SyntheticVideo {
    /// A well-behaved video with `frames` decodable frames.
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            reported_frames: None,
            width: 4,
            height: 2,
            fps: 25.0,
            seek_offset: 0,
            honest_position: false,
            corrupt_after_seek: false,
        }
    }

    /// Container metadata claims `count` frames.
    pub fn reporting_frames(mut self, count: usize) -> Self {
        self.reported_frames = Some(count);
        self
    }

    /// Native seeks land `offset` frames away from the target.
    pub fn with_seek_offset(mut self, offset: isize) -> Self {
        self.seek_offset = offset;
        self
    }

    /// After a native seek, report where the decoder actually landed instead
    /// of echoing the requested frame.
    pub fn with_honest_position(mut self) -> Self {
        self.honest_position = true;
        self
    }

    /// The first frame decoded after a native seek has corrupted content.
    pub fn with_corrupt_after_seek(mut self) -> Self {
        self.corrupt_after_seek = true;
        self
    }

    pub fn with_geometry(mut self, width: u32, height: u32, fps: f64) -> Self {
        self.width = width;
        self.height = height;
        self.fps = fps;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Content of frame `index`.
    pub fn render(&self, index: usize) -> Frame {
        let len = (self.width * self.height * 3) as usize;
        let mut data: Vec<u8> = (0..len)
            .map(|i| ((index * 31 + i * 7) % 251) as u8)
            .collect();
        for (dst, src) in data.iter_mut().zip((index as u64).to_le_bytes()) {
            *dst = src;
        }
        Frame {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Counters shared between a [`SyntheticBackend`] and its decoders.
#[derive(Debug, Default)]
pub struct SyntheticStats {
    opens: AtomicUsize,
    live_handles: AtomicIsize,
    native_seeks: AtomicUsize,
    reads: AtomicUsize,
}

impl SyntheticStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// Decoders opened and not yet dropped.
    pub fn live_handles(&self) -> isize {
        self.live_handles.load(Ordering::Relaxed)
    }

    pub fn native_seeks(&self) -> usize {
        self.native_seeks.load(Ordering::Relaxed)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    video: SyntheticVideo,
    stats: Arc<SyntheticStats>,
}

impl SyntheticBackend {
    pub fn new(video: SyntheticVideo) -> Self {
        Self {
            video,
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    pub fn video(&self) -> &SyntheticVideo {
        &self.video
    }

    pub fn stats(&self) -> Arc<SyntheticStats> {
        self.stats.clone()
    }
}

impl Backend for SyntheticBackend {
    type Decoder = SyntheticDecoder;

    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self, path: &Path) -> VideoResult<SyntheticDecoder> {
        if path.as_os_str().is_empty() {
            return Err(VideoError::Open {
                path: path.to_path_buf(),
                reason: "empty path".to_string(),
            });
        }
        self.stats.opens.fetch_add(1, Ordering::Relaxed);
        self.stats.live_handles.fetch_add(1, Ordering::Relaxed);
        Ok(SyntheticDecoder {
            video: self.video.clone(),
            cursor: 0,
            claimed: 0,
            corrupt_next: false,
            stats: self.stats.clone(),
        })
    }
}

pub struct SyntheticDecoder {
    video: SyntheticVideo,
    /// Next frame actually produced.
    cursor: usize,
    /// Next frame as reported by `position()`.
    claimed: usize,
    corrupt_next: bool,
    stats: Arc<SyntheticStats>,
}

impl Decoder for SyntheticDecoder {
    fn read(&mut self) -> VideoResult<Option<Frame>> {
        if self.cursor >= self.video.frames {
            return Ok(None);
        }
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        let mut frame = self.video.render(self.cursor);
        if self.corrupt_next {
            for byte in frame.data.iter_mut() {
                *byte ^= 0xA5;
            }
            self.corrupt_next = false;
        }
        self.cursor += 1;
        self.claimed += 1;
        Ok(Some(frame))
    }

    fn set_position(&mut self, frame_number: usize) -> VideoResult<()> {
        self.stats.native_seeks.fetch_add(1, Ordering::Relaxed);
        let landed = (frame_number as isize + self.video.seek_offset)
            .clamp(0, self.video.frames as isize) as usize;
        self.cursor = landed;
        self.claimed = if self.video.honest_position {
            landed
        } else {
            frame_number
        };
        self.corrupt_next = self.video.corrupt_after_seek;
        Ok(())
    }

    fn position(&self) -> VideoResult<usize> {
        Ok(self.claimed)
    }

    fn reported_frame_count(&self) -> VideoResult<Option<usize>> {
        Ok(Some(self.video.reported_frames.unwrap_or(self.video.frames)))
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            width: self.video.width,
            height: self.video.height,
            fps: self.video.fps,
        }
    }
}

impl Drop for SyntheticDecoder {
    fn drop(&mut self) {
        self.stats.live_handles.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_distinct() {
        let video = SyntheticVideo::new(300);
        let digests: std::collections::HashSet<_> =
            (0..300).map(|i| video.render(i).digest()).collect();
        assert_eq!(digests.len(), 300);
    }

    #[test]
    fn test_imprecise_seek_lands_early() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(13).with_seek_offset(-1));
        let mut decoder = backend.open(Path::new("clip.avi")).unwrap();
        decoder.set_position(12).unwrap();
        assert_eq!(decoder.position().unwrap(), 12);
        let frame = decoder.read().unwrap().unwrap();
        assert_eq!(frame, backend.video().render(11));
    }

    #[test]
    fn test_handles_released_on_drop() {
        let backend = SyntheticBackend::new(SyntheticVideo::new(3));
        let stats = backend.stats();
        {
            let _a = backend.open(Path::new("a.avi")).unwrap();
            let _b = backend.open(Path::new("a.avi")).unwrap();
            assert_eq!(stats.live_handles(), 2);
        }
        assert_eq!(stats.live_handles(), 0);
        assert_eq!(stats.opens(), 2);
    }
}
