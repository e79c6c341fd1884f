use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a [`crate::video::VideoReader`] or the decoder behind it.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("cannot open video {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The backend could not produce the next frame.
    #[error("cannot read frame {frame} from video {path:?} (length {length})")]
    Decode {
        frame: usize,
        path: PathBuf,
        length: LengthHint,
    },

    /// The backend's own position disagrees with the position we asked for.
    #[error("backend reports the current position is at frame {reported}, expected {requested}")]
    SeekInconsistency { requested: usize, reported: usize },

    #[error("requested frame {requested} but the reader produced frame {returned}")]
    FramePositionMismatch { requested: usize, returned: usize },

    #[error("unknown seek mode {0:?}; must be a non-negative integer, \"never\" or \"always\"")]
    InvalidStrategy(String),

    #[error("frame count probe failed: {0}")]
    Probe(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Length as known at the time an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthHint {
    Known(usize),
    Unknown,
}

impl std::fmt::Display for LengthHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthHint::Known(n) => write!(f, "{}", n),
            LengthHint::Unknown => f.write_str("unknown"),
        }
    }
}

impl From<Option<usize>> for LengthHint {
    fn from(value: Option<usize>) -> Self {
        value.map(LengthHint::Known).unwrap_or(LengthHint::Unknown)
    }
}

pub type VideoResult<T> = std::result::Result<T, VideoError>;
