/// 视频文件解码器 (独立解码线程)
/// Video file decoder running FFmpeg on its own thread
use std::path::Path;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;

use super::decode_filter::{DecodeFilter, Decoded};
use super::FrameSource;
use crate::error::{PipelineError, PipelineResult};

/// Decoded frames buffered between the FFmpeg thread and the pipeline.
const DECODE_QUEUE: usize = 8;

pub struct FfmpegSource {
    rx: Receiver<Decoded>,
    fps: Option<f64>,
    failed: bool,
    _worker: JoinHandle<()>,
}

impl FfmpegSource {
    /// Start decoding `path`. `fps` overrides the probed frame rate.
    pub fn open(path: &Path, fps: Option<f64>) -> Result<Self> {
        let url = path
            .to_str()
            .with_context(|| format!("non UTF-8 path {}", path.display()))?
            .to_string();

        let probed = match find_video_stream_info(url.clone()) {
            Ok(Some(StreamInfo::Video { fps, .. })) if fps.is_finite() && fps > 0.0 => Some(fps),
            Ok(_) => None,
            Err(e) => {
                log::warn!("could not probe {}: {e}", path.display());
                None
            }
        };
        let fps = fps.or(probed);
        log::info!(
            "decoding {} at {}",
            path.display(),
            fps.map_or("unknown fps".to_string(), |f| format!("{f:.2} fps"))
        );

        let (tx, rx) = bounded(DECODE_QUEUE);
        let worker = thread::Builder::new()
            .name("decode".to_string())
            .spawn(move || {
                let failure = tx.clone();
                if let Err(e) = decode(&url, DecodeFilter::new(tx)) {
                    let _ = failure.send(Decoded::Failed(e.to_string()));
                }
            })
            .context("failed to spawn decode thread")?;

        Ok(Self {
            rx,
            fps,
            failed: false,
            _worker: worker,
        })
    }
}

fn decode(url: &str, filter: DecodeFilter) -> Result<()> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(url))
        .filter_desc("format=rgb24")
        .output(out)
        .build()
        .context("failed to build ffmpeg context")?;

    let sch = ctx.start().context("failed to start ffmpeg")?;
    sch.wait().context("ffmpeg decode failed")?;
    Ok(())
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        if self.failed {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(Decoded::Frame(frame)) => Ok(Some(frame)),
            Ok(Decoded::Failed(reason)) => {
                self.failed = true;
                Err(PipelineError::source_unreadable(reason))
            }
            // decode thread finished and dropped its sender
            Err(_) => Ok(None),
        }
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }
}
