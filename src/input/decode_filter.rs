/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;

/// 解码线程 → 管线
pub enum Decoded {
    Frame(RgbImage),
    Failed(String),
}

/// FFmpeg解码过滤器: 视频帧(rgb24) → RgbImage
///
/// Frames are sent with a blocking send so a slow pipeline throttles the
/// decoder instead of losing frames.
pub struct DecodeFilter {
    tx: Sender<Decoded>,
    pub count: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<Decoded>) -> Self {
        Self { tx, count: 0 }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("decode thread started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() {
                return Ok(Some(frame));
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            if data.is_null() || w == 0 || h == 0 || stride < w as usize * 3 {
                return Err(format!("unexpected frame layout {w}x{h} stride {stride}"));
            }

            // rgb24, one packed plane; rows may be padded
            let row_bytes = w as usize * 3;
            let mut pixels = Vec::with_capacity(row_bytes * h as usize);
            for y in 0..h as usize {
                let row = std::slice::from_raw_parts(data.add(y * stride), row_bytes);
                pixels.extend_from_slice(row);
            }
            RgbImage::from_raw(w, h, pixels)
        };

        let Some(image) = image else {
            return Err("frame buffer size mismatch".to_string());
        };
        self.count += 1;

        // receiver gone: the pipeline stopped reading
        self.tx
            .send(Decoded::Frame(image))
            .map_err(|_| "pipeline closed".to_string())?;
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!("decode thread finished after {} frames", self.count);
    }
}
