use super::{Backend, Decoder, Frame, StreamInfo};
use crate::error::{VideoError, VideoResult};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES,
    },
};
use std::path::Path;

fn backend_err(e: opencv::Error) -> VideoError {
    VideoError::Backend(format!("opencv: {}", e))
}

/// OpenCV `VideoCapture` with whatever videoio backend OpenCV picks
/// (usually its bundled FFmpeg).
#[derive(Debug, Default, Clone, Copy)]
pub struct OpencvBackend;

impl Backend for OpencvBackend {
    type Decoder = OpencvDecoder;

    fn name(&self) -> &str {
        "opencv"
    }

    fn open(&self, path: &Path) -> VideoResult<OpencvDecoder> {
        let path_str = path.to_str().ok_or_else(|| VideoError::Open {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8".to_string(),
        })?;
        let capture = VideoCapture::from_file(path_str, CAP_ANY).map_err(|e| VideoError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !capture.is_opened().map_err(backend_err)? {
            return Err(VideoError::Open {
                path: path.to_path_buf(),
                reason: "OpenCV cannot open video".to_string(),
            });
        }

        let fps = capture.get(CAP_PROP_FPS).map_err(backend_err)?;
        let width = capture.get(CAP_PROP_FRAME_WIDTH).map_err(backend_err)? as u32;
        let height = capture.get(CAP_PROP_FRAME_HEIGHT).map_err(backend_err)? as u32;
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT).map_err(backend_err)?;

        tracing::info!(
            "OpencvDecoder: opened {}, {}x{}, fps={:.2}, stream_frames={}",
            path_str,
            width,
            height,
            fps,
            raw_count
        );

        Ok(OpencvDecoder {
            capture,
            info: StreamInfo { width, height, fps },
        })
    }
}

pub struct OpencvDecoder {
    capture: VideoCapture,
    info: StreamInfo,
}

impl Decoder for OpencvDecoder {
    fn read(&mut self) -> VideoResult<Option<Frame>> {
        let mut mat = Mat::default();
        let success = self.capture.read(&mut mat).map_err(backend_err)?;
        if !success || mat.empty() {
            return Ok(None);
        }
        // data_bytes needs a continuous buffer
        if !mat.is_continuous() {
            mat = mat.try_clone().map_err(backend_err)?;
        }
        let data = mat.data_bytes().map_err(backend_err)?.to_vec();
        Ok(Some(Frame {
            width: mat.cols() as u32,
            height: mat.rows() as u32,
            data,
        }))
    }

    fn set_position(&mut self, frame_number: usize) -> VideoResult<()> {
        let accepted = self
            .capture
            .set(CAP_PROP_POS_FRAMES, frame_number as f64)
            .map_err(backend_err)?;
        if !accepted {
            tracing::warn!(
                "OpencvDecoder: backend refused to seek to frame {}",
                frame_number
            );
        }
        Ok(())
    }

    fn position(&self) -> VideoResult<usize> {
        let pos = self.capture.get(CAP_PROP_POS_FRAMES).map_err(backend_err)?;
        Ok(pos.max(0.0).round() as usize)
    }

    fn reported_frame_count(&self) -> VideoResult<Option<usize>> {
        let count = self.capture.get(CAP_PROP_FRAME_COUNT).map_err(backend_err)?;
        if count.is_finite() && count > 0.0 {
            Ok(Some(count as usize))
        } else {
            Ok(None)
        }
    }

    fn info(&self) -> StreamInfo {
        self.info
    }
}

impl Drop for OpencvDecoder {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvDecoder: release failed: {}", e);
        }
    }
}
