/// 视频输入系统 (Video Input System)
///
/// 帧来源, 按顺序产生固定尺寸的 RGB 帧
/// - ImageSequenceSource: 目录中的图片序列 (按文件名排序)
/// - FfmpegSource: 视频文件解码 (feature `ffmpeg`, 独立解码线程)
use std::path::Path;

use anyhow::{bail, Result};
use image::RgbImage;

use crate::error::PipelineResult;

#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod decoder;
pub mod sequence;

#[cfg(feature = "ffmpeg")]
pub use decoder::FfmpegSource;
pub use sequence::ImageSequenceSource;

/// 帧来源
pub trait FrameSource {
    /// `Ok(None)` when the stream is exhausted.
    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>>;

    /// Native frame rate, when the source knows it.
    fn fps(&self) -> Option<f64>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        (**self).next_frame()
    }

    fn fps(&self) -> Option<f64> {
        (**self).fps()
    }
}

/// Directory → image sequence; anything else → video file.
/// `fps` overrides what the source reports.
pub fn open_source(path: &Path, fps: Option<f64>) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path, fps)?));
    }
    if !path.exists() {
        bail!("input {} does not exist", path.display());
    }
    open_video(path, fps)
}

#[cfg(feature = "ffmpeg")]
fn open_video(path: &Path, fps: Option<f64>) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(FfmpegSource::open(path, fps)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_video(path: &Path, _fps: Option<f64>) -> Result<Box<dyn FrameSource>> {
    bail!(
        "{} looks like a video file; rebuild with `--features ffmpeg` or pass a directory of frames",
        path.display()
    )
}
