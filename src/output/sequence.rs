use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use super::FrameSink;
use crate::error::{PipelineError, PipelineResult};

/// Writes `frame_000000.png`, `frame_000001.png`, ... into a directory.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: usize,
    finished: bool,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
            finished: false,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for ImageSequenceSink {
    fn write(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        let path = self.frame_path(self.written);
        frame
            .save(&path)
            .map_err(|e| PipelineError::sink_unwritable(format!("{}: {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        self.finished = true;
        log::debug!("{} frames written to {}", self.written, self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_frames_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated");
        let mut sink = ImageSequenceSink::create(&out).unwrap();

        for shade in [5u8, 6, 7] {
            sink.write(&RgbImage::from_pixel(3, 2, image::Rgb([shade, shade, shade])))
                .unwrap();
        }
        sink.finish().unwrap();

        assert_eq!(sink.written(), 3);
        let second = image::open(out.join("frame_000001.png")).unwrap().to_rgb8();
        assert_eq!(second.get_pixel(0, 0).0, [6, 6, 6]);
        assert!(!out.join("frame_000003.png").exists());
    }

    #[test]
    fn unwritable_target_is_a_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path()).unwrap();
        // occupy the first frame's name with a directory
        fs::create_dir(sink.frame_path(0)).unwrap();
        let err = sink.write(&RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, PipelineError::OutputSinkUnwritable { .. }));
    }
}
