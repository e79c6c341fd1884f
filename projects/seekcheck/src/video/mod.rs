pub mod build_info;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_reader;
pub mod length;
#[cfg(feature = "opencv")]
pub mod opencv_reader;
pub mod reader;
pub mod strategy;
pub mod synthetic;

use crate::error::VideoResult;
use crate::hashing::{hash_frame, FrameDigest};
use std::path::Path;

pub use length::LengthSource;
pub use reader::{ReaderOptions, SeekingReader};
pub use strategy::SeekStrategy;

/// A decoded image, packed BGR24 rows without stride padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn digest(&self) -> FrameDigest {
        hash_frame(&self.data)
    }
}

/// Stream geometry, fixed for the lifetime of a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// A native decoder handle. Dropping it releases the underlying resources.
///
/// Every method is fallible and none of the reported numbers are trusted by
/// the callers.
pub trait Decoder {
    /// Decode the next frame, `None` once the backend has nothing more to give.
    fn read(&mut self) -> VideoResult<Option<Frame>>;
    /// Native seek: ask the backend to continue decoding at `frame_number`.
    fn set_position(&mut self, frame_number: usize) -> VideoResult<()>;
    /// The backend's idea of the next frame it will produce.
    fn position(&self) -> VideoResult<usize>;
    /// Frame count from container metadata. Frequently wrong.
    fn reported_frame_count(&self) -> VideoResult<Option<usize>>;
    fn info(&self) -> StreamInfo;
}

/// Opens [`Decoder`]s for a given decode library.
pub trait Backend: Sync {
    type Decoder: Decoder;

    fn name(&self) -> &str;
    fn open(&self, path: &Path) -> VideoResult<Self::Decoder>;
}

/// Random-access view over a video.
pub trait VideoReader {
    fn path(&self) -> &Path;

    /// Number of the frame the next call to [`VideoReader::next_frame`] produces.
    fn next_frame_number(&self) -> usize;

    /// Decodable frame count; may be probed lazily.
    fn length(&mut self) -> VideoResult<usize>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn fps(&self) -> f64;

    fn next_frame(&mut self) -> VideoResult<(usize, Frame)>;

    /// Position the reader so the next sequential read yields `frame_number`.
    fn seek(&mut self, frame_number: usize) -> VideoResult<()>;

    fn frame(&mut self, frame_number: usize) -> VideoResult<Frame> {
        self.seek(frame_number)?;
        let (returned, frame) = self.next_frame()?;
        if returned != frame_number {
            return Err(crate::error::VideoError::FramePositionMismatch {
                requested: frame_number,
                returned,
            });
        }
        Ok(frame)
    }

    /// (height, width)
    fn image_shape(&self) -> (u32, u32) {
        (self.height(), self.width())
    }

    /// (width, height)
    fn image_size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn frames(&mut self) -> Frames<'_, Self>
    where
        Self: Sized,
    {
        Frames {
            reader: self,
            done: false,
        }
    }
}

/// Sequential iterator returned by [`VideoReader::frames`].
///
/// Stops once `next_frame_number` reaches the reader's length, or after the
/// first error.
pub struct Frames<'a, R: VideoReader> {
    reader: &'a mut R,
    done: bool,
}

impl<R: VideoReader> Iterator for Frames<'_, R> {
    type Item = VideoResult<(usize, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let length = match self.reader.length() {
            Ok(length) => length,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if self.reader.next_frame_number() >= length {
            self.done = true;
            return None;
        }
        let item = self.reader.next_frame();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
