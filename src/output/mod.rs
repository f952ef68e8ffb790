/// 输出系统 (Output System)
///
/// 标注后的帧按输入顺序写出
/// - ImageSequenceSink: 编号 PNG 序列
/// - FfmpegSink: 编码为视频文件 (feature `ffmpeg`)
use std::path::Path;

use anyhow::Result;
use image::RgbImage;

use crate::error::PipelineResult;

#[cfg(feature = "ffmpeg")]
pub mod encoder;
pub mod sequence;

#[cfg(feature = "ffmpeg")]
pub use encoder::FfmpegSink;
pub use sequence::ImageSequenceSink;

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mkv", "mov", "webm"];

/// 帧输出
pub trait FrameSink {
    fn write(&mut self, frame: &RgbImage) -> PipelineResult<()>;

    /// Flush and close. Not called after a failed run.
    fn finish(&mut self) -> PipelineResult<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        (**self).write(frame)
    }

    fn finish(&mut self) -> PipelineResult<()> {
        (**self).finish()
    }
}

pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Video extension → encoder; anything else is a frame directory.
pub fn open_sink(path: &Path, fps: f64) -> Result<Box<dyn FrameSink>> {
    if is_video_path(path) {
        return open_video(path, fps);
    }
    Ok(Box::new(ImageSequenceSink::create(path)?))
}

#[cfg(feature = "ffmpeg")]
fn open_video(path: &Path, fps: f64) -> Result<Box<dyn FrameSink>> {
    Ok(Box::new(FfmpegSink::create(path, fps)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_video(path: &Path, _fps: f64) -> Result<Box<dyn FrameSink>> {
    anyhow::bail!(
        "writing {} needs `--features ffmpeg`; pass a directory to write PNG frames",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_extensions() {
        assert!(is_video_path(Path::new("out/result.MP4")));
        assert!(is_video_path(Path::new("a.mkv")));
        assert!(!is_video_path(Path::new("out/frames")));
        assert!(!is_video_path(Path::new("frame.png")));
    }
}
