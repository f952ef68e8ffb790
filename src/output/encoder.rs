/// 视频编码输出
/// Frames are staged as PNG next to the target, then encoded in one
/// FFmpeg pass at the source frame rate when the run finishes.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::RgbImage;

use super::sequence::ImageSequenceSink;
use super::FrameSink;
use crate::error::{PipelineError, PipelineResult};

pub struct FfmpegSink {
    target: PathBuf,
    fps: f64,
    staging: ImageSequenceSink,
}

impl FfmpegSink {
    pub fn create(target: &Path, fps: f64) -> Result<Self> {
        let mut staging_dir = target.as_os_str().to_owned();
        staging_dir.push(".frames");
        let staging = ImageSequenceSink::create(Path::new(&staging_dir))?;
        Ok(Self {
            target: target.to_path_buf(),
            fps,
            staging,
        })
    }

    fn encode(&self) -> Result<()> {
        let pattern = self.staging.dir().join("frame_%06d.png");
        let rate = format!("{}", self.fps);
        let input = Input::new(pattern.to_string_lossy().to_string())
            .set_input_opts([("framerate", rate.as_str())].into());

        FfmpegContext::builder()
            .input(input)
            .filter_desc("format=yuv420p")
            .output(Output::new(self.target.to_string_lossy().to_string()))
            .build()?
            .start()?
            .wait()?;
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        self.staging.write(frame)
    }

    fn finish(&mut self) -> PipelineResult<()> {
        self.staging.finish()?;
        if self.staging.written() == 0 {
            log::warn!("no frames to encode into {}", self.target.display());
            return Ok(());
        }
        log::info!(
            "encoding {} frames into {} at {:.2} fps",
            self.staging.written(),
            self.target.display(),
            self.fps
        );
        self.encode().map_err(|e| {
            PipelineError::sink_unwritable(format!("{}: {e:#}", self.target.display()))
        })?;
        if let Err(e) = fs::remove_dir_all(self.staging.dir()) {
            log::warn!("could not remove {}: {e}", self.staging.dir().display());
        }
        Ok(())
    }
}
