use super::{Backend, Decoder, Frame, LengthSource, SeekStrategy, StreamInfo, VideoReader};
use crate::error::{VideoError, VideoResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub strategy: SeekStrategy,
    /// After every seek, ask the backend where it thinks it is and fail with
    /// [`VideoError::SeekInconsistency`] if it disagrees.
    pub double_check_seek: bool,
    pub length_source: LengthSource,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            strategy: SeekStrategy::Never,
            double_check_seek: true,
            length_source: LengthSource::Ffprobe,
        }
    }
}

impl ReaderOptions {
    pub fn new(strategy: SeekStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn double_check_seek(mut self, enabled: bool) -> Self {
        self.double_check_seek = enabled;
        self
    }

    pub fn length_source(mut self, source: LengthSource) -> Self {
        self.length_source = source;
        self
    }
}

enum LengthState {
    Unknown,
    Known(usize),
}

enum ReaderState<D> {
    Closed,
    Open { decoder: D, length: LengthState },
}

/// [`VideoReader`] over any [`Backend`], seeking according to a
/// [`SeekStrategy`].
///
/// The decoder is opened on construction and released when the reader is
/// closed or dropped. Moving backwards without a native seek closes and
/// reopens the decoder, which also forgets the probed length.
pub struct SeekingReader<'b, B: Backend> {
    backend: &'b B,
    path: PathBuf,
    options: ReaderOptions,
    info: StreamInfo,
    cursor: usize,
    state: ReaderState<B::Decoder>,
}

impl<'b, B: Backend> SeekingReader<'b, B> {
    pub fn open(backend: &'b B, path: &Path, options: ReaderOptions) -> VideoResult<Self> {
        let decoder = backend.open(path)?;
        let info = decoder.info();
        tracing::debug!(
            "SeekingReader: opened {:?} with {} ({}x{} @ {:.2} fps, seek={})",
            path,
            backend.name(),
            info.width,
            info.height,
            info.fps,
            options.strategy
        );
        Ok(Self {
            backend,
            path: path.to_path_buf(),
            options,
            info,
            cursor: 0,
            state: ReaderState::Open {
                decoder,
                length: LengthState::Unknown,
            },
        })
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// `{backend}-{strategy}`, e.g. `opencv-always-seek`.
    pub fn strategy_id(&self) -> String {
        format!("{}-{}", self.backend.name(), self.options.strategy.id())
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ReaderState::Open { .. })
    }

    /// Length if it has already been probed since the last (re)open.
    pub fn known_length(&self) -> Option<usize> {
        match &self.state {
            ReaderState::Open {
                length: LengthState::Known(n),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    /// Release the decoder. The next read or seek reopens from frame 0.
    pub fn close(&mut self) {
        if self.is_open() {
            tracing::debug!("SeekingReader: closing {:?}", self.path);
        }
        self.state = ReaderState::Closed;
        self.cursor = 0;
    }

    fn reopen(&mut self) -> VideoResult<()> {
        self.close();
        self.decoder().map(|_| ())
    }

    fn decoder(&mut self) -> VideoResult<&mut B::Decoder> {
        if let ReaderState::Closed = self.state {
            let decoder = self.backend.open(&self.path)?;
            self.state = ReaderState::Open {
                decoder,
                length: LengthState::Unknown,
            };
        }
        match &mut self.state {
            ReaderState::Open { decoder, .. } => Ok(decoder),
            ReaderState::Closed => Err(VideoError::Backend(format!(
                "decoder for {:?} is closed",
                self.path
            ))),
        }
    }
}

impl<B: Backend> VideoReader for SeekingReader<'_, B> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn next_frame_number(&self) -> usize {
        self.cursor
    }

    fn length(&mut self) -> VideoResult<usize> {
        self.decoder()?;
        let ReaderState::Open { decoder, length } = &mut self.state else {
            return Err(VideoError::Backend(format!(
                "decoder for {:?} is closed",
                self.path
            )));
        };
        match length {
            LengthState::Known(n) => Ok(*n),
            LengthState::Unknown => {
                let n = self.options.length_source.probe(&self.path, decoder)?;
                *length = LengthState::Known(n);
                Ok(n)
            }
        }
    }

    fn width(&self) -> u32 {
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn next_frame(&mut self) -> VideoResult<(usize, Frame)> {
        let frame_number = self.cursor;
        match self.decoder()?.read()? {
            Some(frame) => {
                self.cursor += 1;
                Ok((frame_number, frame))
            }
            None => Err(VideoError::Decode {
                frame: frame_number,
                path: self.path.clone(),
                length: self.known_length().into(),
            }),
        }
    }

    fn seek(&mut self, frame_number: usize) -> VideoResult<()> {
        if self.options.strategy.should_seek(self.cursor, frame_number) {
            self.decoder()?.set_position(frame_number)?;
            self.cursor = frame_number;
        } else {
            if self.cursor > frame_number {
                self.reopen()?;
            }
            while self.cursor < frame_number {
                self.next_frame()?;
            }
        }

        if self.options.double_check_seek {
            let reported = self.decoder()?.position()?;
            if reported != frame_number {
                return Err(VideoError::SeekInconsistency {
                    requested: frame_number,
                    reported,
                });
            }
        }
        Ok(())
    }
}
