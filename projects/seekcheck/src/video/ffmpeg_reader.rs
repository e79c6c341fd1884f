use super::{Backend, Decoder, Frame, StreamInfo};
use crate::error::{VideoError, VideoResult};
use ffmpeg_next::ffi;
use std::path::Path;
use std::sync::Once;

fn backend_err(context: &str, e: ffmpeg_next::Error) -> VideoError {
    VideoError::Backend(format!("ffmpeg: {}: {}", context, e))
}

static FFMPEG_INIT: Once = Once::new();

/// Software decoding through ffmpeg-next. Frames are converted to BGR24 so
/// their digests are comparable with the OpenCV backend's.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl Backend for FfmpegBackend {
    type Decoder = FfmpegDecoder;

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, path: &Path) -> VideoResult<FfmpegDecoder> {
        let mut init_result = Ok(());
        FFMPEG_INIT.call_once(|| init_result = ffmpeg_next::init());
        init_result.map_err(|e| backend_err("init", e))?;

        if !path.exists() {
            return Err(VideoError::Open {
                path: path.to_path_buf(),
                reason: "video file not found".to_string(),
            });
        }

        let input_ctx = ffmpeg_next::format::input(&path).map_err(|e| VideoError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| VideoError::Open {
                path: path.to_path_buf(),
                reason: "no video stream".to_string(),
            })?;
        let video_stream_index = video_stream.index();
        let time_base = video_stream.time_base();

        let rational_fps = video_stream.avg_frame_rate();
        let fps = if rational_fps.denominator() > 0 && rational_fps.numerator() > 0 {
            rational_fps.numerator() as f64 / rational_fps.denominator() as f64
        } else {
            tracing::warn!("FfmpegDecoder: could not determine FPS, defaulting to 30.0");
            30.0
        };

        let stream_frames = video_stream.frames();
        let duration_secs = input_ctx.duration() as f64 / ffi::AV_TIME_BASE as f64;
        let reported_frames = if stream_frames > 0 {
            Some(stream_frames as usize)
        } else if duration_secs > 0.0 {
            Some((duration_secs * fps).round() as usize)
        } else {
            None
        };
        let start_pts = match video_stream.start_time() {
            ffi::AV_NOPTS_VALUE => 0,
            pts => pts,
        };

        let decoder_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())
                .map_err(|e| backend_err("decoder context", e))?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| backend_err("open video decoder", e))?;

        let width = decoder.width();
        let height = decoder.height();

        tracing::info!(
            "FfmpegDecoder: opened {:?}, {}x{}, duration={:.2}s, fps={:.2}, stream_frames={}",
            path,
            width,
            height,
            duration_secs,
            fps,
            stream_frames
        );

        Ok(FfmpegDecoder {
            input_ctx,
            decoder,
            video_stream_index,
            time_base: (time_base.numerator(), time_base.denominator()),
            start_pts,
            scaler: None,
            info: StreamInfo { width, height, fps },
            reported_frames,
            next_frame: 0,
            pending: None,
            packet: ffmpeg_next::codec::packet::Packet::empty(),
            eof_sent: false,
        })
    }
}

pub struct FfmpegDecoder {
    input_ctx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::codec::decoder::Video,
    video_stream_index: usize,
    time_base: (i32, i32),
    start_pts: i64,
    /// Created on the first frame, once the source pixel format is known.
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    info: StreamInfo,
    reported_frames: Option<usize>,
    next_frame: usize,
    /// Frame decoded by `set_position` to learn where the seek landed; handed
    /// out by the next `read`.
    pending: Option<Frame>,
    packet: ffmpeg_next::codec::packet::Packet,
    eof_sent: bool,
}

impl FfmpegDecoder {
    /// Pull the next decoded frame, feeding packets as needed. `Ok(false)` at
    /// end of stream.
    fn decode_next(&mut self, target: &mut ffmpeg_next::util::frame::Video) -> VideoResult<bool> {
        loop {
            match self.decoder.receive_frame(target) {
                Ok(()) => return Ok(true),
                Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }) => {
                    if self.eof_sent {
                        return Ok(false);
                    }
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(false),
                Err(e) => return Err(backend_err("decode", e)),
            }

            let mut found_packet = false;
            while self.packet.read(&mut self.input_ctx).is_ok() {
                if self.packet.stream() == self.video_stream_index {
                    self.decoder
                        .send_packet(&self.packet)
                        .map_err(|e| backend_err("send packet", e))?;
                    found_packet = true;
                    break;
                }
            }

            if !found_packet {
                // flush the decoder's remaining frames
                self.decoder
                    .send_eof()
                    .map_err(|e| backend_err("send eof", e))?;
                self.eof_sent = true;
            }
        }
    }

    fn timestamp_to_frame(&self, pts: i64) -> usize {
        let (num, den) = self.time_base;
        if den == 0 {
            return self.next_frame;
        }
        let secs = (pts - self.start_pts) as f64 * num as f64 / den as f64;
        (secs * self.info.fps).round().max(0.0) as usize
    }

    fn to_bgr(&mut self, frame: &ffmpeg_next::util::frame::Video) -> VideoResult<Frame> {
        if self.scaler.is_none() {
            let scaler = ffmpeg_next::software::scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                ffmpeg_next::format::Pixel::BGR24,
                frame.width(),
                frame.height(),
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| backend_err("create scaler", e))?;
            self.scaler = Some(scaler);
        }
        let Some(scaler) = self.scaler.as_mut() else {
            return Err(VideoError::Backend("ffmpeg: scaler unavailable".to_string()));
        };

        let mut bgr = ffmpeg_next::util::frame::Video::empty();
        scaler
            .run(frame, &mut bgr)
            .map_err(|e| backend_err("scale", e))?;

        // Drop stride padding so equal images hash equally.
        let width = bgr.width() as usize;
        let height = bgr.height() as usize;
        let stride = bgr.stride(0);
        let plane = bgr.data(0);
        let row_bytes = width * 3;
        let mut data = Vec::with_capacity(row_bytes * height);
        for y in 0..height {
            let offset = y * stride;
            data.extend_from_slice(&plane[offset..offset + row_bytes]);
        }

        Ok(Frame {
            width: width as u32,
            height: height as u32,
            data,
        })
    }
}

impl Decoder for FfmpegDecoder {
    fn read(&mut self) -> VideoResult<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            self.next_frame += 1;
            return Ok(Some(frame));
        }
        let mut raw = ffmpeg_next::util::frame::Video::empty();
        if !self.decode_next(&mut raw)? {
            return Ok(None);
        }
        let frame = self.to_bgr(&raw)?;
        self.next_frame += 1;
        Ok(Some(frame))
    }

    /// Seeks by timestamp, then decodes the frame the demuxer landed on so
    /// `position` reports where the seek actually went rather than echoing
    /// `frame_number`.

    fn set_position(&mut self, frame_number: usize) -> VideoResult<()> {
        let time_secs = frame_number as f64 / self.info.fps;
        let timestamp = (time_secs * ffi::AV_TIME_BASE as f64) as i64;
        self.input_ctx
            .seek(timestamp, ..timestamp)
            .map_err(|e| backend_err("seek", e))?;
        self.decoder.flush();
        self.eof_sent = false;
        self.scaler = None;
        self.pending = None;
        self.next_frame = frame_number;

        let mut raw = ffmpeg_next::util::frame::Video::empty();
        if self.decode_next(&mut raw)? {
            if let Some(pts) = raw.timestamp() {
                self.next_frame = self.timestamp_to_frame(pts);
            }
            self.pending = Some(self.to_bgr(&raw)?);
        }
        tracing::debug!(
            "FfmpegDecoder: seek to frame {} landed on frame {}",
            frame_number,
            self.next_frame
        );
        Ok(())
    }

    fn position(&self) -> VideoResult<usize> {
        Ok(self.next_frame)
    }

    fn reported_frame_count(&self) -> VideoResult<Option<usize>> {
        Ok(self.reported_frames)
    }

    fn info(&self) -> StreamInfo {
        self.info
    }
}
